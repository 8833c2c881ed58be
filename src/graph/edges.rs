use std::collections::HashSet;

use crate::corpus::{Contact, FactCorpus, FactType};
use crate::graph::GraphEdge;
use crate::graph::pairing::ComparisonSet;

pub const SIMILARITY_THRESHOLD: f32 = 0.6;

pub fn accepts_similarity(score: f32) -> bool {
    score >= SIMILARITY_THRESHOLD
}

/// `{source}-{target}-{fact_type}`. Hyphens and backslashes inside contact
/// ids are backslash-escaped so distinct pairs never share an id.
pub fn edge_id(source: &str, target: &str, fact_type: FactType) -> String {
    format!(
        "{}-{}-{}",
        escape_id(source),
        escape_id(target),
        fact_type.as_str()
    )
}

fn escape_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for ch in id.chars() {
        if ch == '-' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Walks every contact pair in input order and every same-type fact pair
/// between them. The first exact or accepted fuzzy match per
/// (contact pair, fact type) becomes the edge; later matches are ignored.
pub fn build_edges(
    contacts: &[Contact],
    corpus: &FactCorpus,
    comparisons: &ComparisonSet,
) -> Vec<GraphEdge> {
    let with_facts = contacts
        .iter()
        .filter(|contact| !corpus.facts_for(&contact.id).is_empty())
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (i, source) in with_facts.iter().enumerate() {
        for (j, target) in with_facts.iter().enumerate().skip(i + 1) {
            for left in corpus.facts_for(&source.id) {
                for right in corpus.facts_for(&target.id) {
                    if left.fact_type != right.fact_type {
                        continue;
                    }
                    let key = (i, j, left.fact_type);
                    if seen.contains(&key) {
                        continue;
                    }

                    let left_value = left.normalized_value();
                    let right_value = right.normalized_value();
                    if left_value.is_empty() || right_value.is_empty() {
                        continue;
                    }

                    let edge = if left_value == right_value {
                        Some((left.fact_value.trim().to_string(), 1.0))
                    } else {
                        comparisons
                            .get(left.fact_type, &left_value, &right_value)
                            .filter(|score| accepts_similarity(*score))
                            .map(|score| {
                                (
                                    format!(
                                        "{} ≈ {}",
                                        left.fact_value.trim(),
                                        right.fact_value.trim()
                                    ),
                                    score,
                                )
                            })
                    };

                    if let Some((label, similarity)) = edge {
                        seen.insert(key);
                        out.push(GraphEdge {
                            id: edge_id(&source.id, &target.id, left.fact_type),
                            source_contact_id: source.id.clone(),
                            target_contact_id: target.id.clone(),
                            fact_type: left.fact_type,
                            label,
                            similarity,
                        });
                    }
                }
            }
        }
    }

    out
}

/// Splits contacts into those touched by an edge and the ids of the rest,
/// both in input order.
pub fn partition_contacts<'a>(
    contacts: &'a [Contact],
    edges: &[GraphEdge],
) -> (Vec<&'a Contact>, Vec<String>) {
    let touched = edges
        .iter()
        .flat_map(|edge| [edge.source_contact_id.as_str(), edge.target_contact_id.as_str()])
        .collect::<HashSet<_>>();

    let mut connected = Vec::new();
    let mut unconnected = Vec::new();
    for contact in contacts {
        if touched.contains(contact.id.as_str()) {
            connected.push(contact);
        } else {
            unconnected.push(contact.id.clone());
        }
    }
    (connected, unconnected)
}
