use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::cache::{ScoredPair, SimilarityCacheEntry};
use crate::corpus::{Fact, FactType};
use crate::resolver::FactQuery;

/// Distinct normalized values per fact type, in a stable order.
pub fn group_values<'a>(
    facts: impl IntoIterator<Item = &'a Fact>,
) -> BTreeMap<FactType, BTreeSet<String>> {
    let mut groups: BTreeMap<FactType, BTreeSet<String>> = BTreeMap::new();
    for fact in facts {
        let value = fact.normalized_value();
        if value.is_empty() {
            continue;
        }
        groups.entry(fact.fact_type).or_default().insert(value);
    }
    groups
}

/// Similarity scores keyed on an unordered value pair within a fact type.
#[derive(Debug, Clone, Default)]
pub struct ComparisonSet {
    scores: HashMap<(FactType, String, String), f32>,
}

impl ComparisonSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(fact_type: FactType, value_a: &str, value_b: &str) -> (FactType, String, String) {
        if value_a <= value_b {
            (fact_type, value_a.to_string(), value_b.to_string())
        } else {
            (fact_type, value_b.to_string(), value_a.to_string())
        }
    }

    /// Later inserts for the same pair replace earlier ones.
    pub fn insert(&mut self, fact_type: FactType, value_a: &str, value_b: &str, score: f32) {
        self.scores
            .insert(Self::key(fact_type, value_a, value_b), score);
    }

    pub fn get(&self, fact_type: FactType, value_a: &str, value_b: &str) -> Option<f32> {
        self.scores
            .get(&Self::key(fact_type, value_a, value_b))
            .copied()
    }

    pub fn contains(&self, fact_type: FactType, value_a: &str, value_b: &str) -> bool {
        self.get(fact_type, value_a, value_b).is_some()
    }

    pub fn extend_cached(&mut self, entries: &[SimilarityCacheEntry]) {
        for entry in entries {
            self.insert(entry.fact_type, &entry.value_a, &entry.value_b, entry.score);
        }
    }

    pub fn extend_resolved(&mut self, pairs: &[ScoredPair]) {
        for pair in pairs {
            self.insert(pair.fact_type, &pair.value_a, &pair.value_b, pair.score);
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Every value taking part in at least one uncompared pair of its fact type.
pub fn values_needing_resolution(
    groups: &BTreeMap<FactType, BTreeSet<String>>,
    known: &ComparisonSet,
) -> Vec<FactQuery> {
    let mut out = Vec::new();
    for (&fact_type, values) in groups {
        if values.len() < 2 {
            continue;
        }
        let values = values.iter().collect::<Vec<_>>();
        let mut missing = BTreeSet::new();
        for i in 0..values.len() {
            for j in (i + 1)..values.len() {
                if !known.contains(fact_type, values[i], values[j]) {
                    missing.insert(values[i]);
                    missing.insert(values[j]);
                }
            }
        }
        out.extend(missing.into_iter().map(|value| FactQuery {
            fact_type,
            fact_value: value.clone(),
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(contact_id: &str, fact_type: FactType, value: &str) -> Fact {
        Fact {
            contact_id: contact_id.to_string(),
            fact_type,
            fact_value: value.to_string(),
        }
    }

    #[test]
    fn groups_deduplicate_normalized_values_per_type() {
        let facts = vec![
            fact("a", FactType::Work, "Google"),
            fact("b", FactType::Work, " google"),
            fact("c", FactType::Work, "Acme"),
            fact("c", FactType::Location, "Google"),
            fact("d", FactType::Hobby, "   "),
        ];
        let groups = group_values(&facts);

        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[&FactType::Work]
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>(),
            vec!["acme", "google"]
        );
        assert_eq!(groups[&FactType::Location].len(), 1);
    }

    #[test]
    fn comparison_set_ignores_query_order_and_keeps_latest() {
        let mut set = ComparisonSet::new();
        set.insert(FactType::Hobby, "go", "chess", 0.4);
        assert_eq!(set.get(FactType::Hobby, "chess", "go"), Some(0.4));

        set.insert(FactType::Hobby, "chess", "go", 0.7);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(FactType::Hobby, "go", "chess"), Some(0.7));
        assert_eq!(set.get(FactType::Interest, "go", "chess"), None);
    }

    #[test]
    fn only_values_in_uncompared_pairs_need_resolution() {
        let facts = vec![
            fact("a", FactType::Work, "Acme"),
            fact("b", FactType::Work, "Acme Corp"),
            fact("c", FactType::Work, "Globex"),
            fact("d", FactType::Hobby, "chess"),
        ];
        let groups = group_values(&facts);
        let mut known = ComparisonSet::new();
        known.insert(FactType::Work, "acme", "acme corp", 0.9);
        known.insert(FactType::Work, "globex", "acme", 0.1);

        let needed = values_needing_resolution(&groups, &known);
        let needed = needed
            .iter()
            .map(|query| query.fact_value.as_str())
            .collect::<Vec<_>>();
        assert_eq!(needed, vec!["acme corp", "globex"]);

        known.insert(FactType::Work, "acme corp", "globex", 0.1);
        assert!(values_needing_resolution(&groups, &known).is_empty());
    }
}
