//! Boundary to the service that scores how similar two fact values are.
//!
//! The builder sends every value that still lacks a fresh comparison in a
//! single batch and treats the answer as an opaque list of scored pairs.
//! Whatever comes back is validated here before it can reach the cache.

pub mod command;
pub mod lexical;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::ScoredPair;
use crate::corpus::{FactType, normalize_value};

pub use command::CommandResolver;
pub use lexical::LexicalResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactQuery {
    pub fact_type: FactType,
    pub fact_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub facts: Vec<FactQuery>,
}

impl ResolveRequest {
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Requested values grouped per fact type, normalized.
    pub fn grouped(&self) -> BTreeMap<FactType, BTreeSet<String>> {
        let mut groups: BTreeMap<FactType, BTreeSet<String>> = BTreeMap::new();
        for query in &self.facts {
            groups
                .entry(query.fact_type)
                .or_default()
                .insert(normalize_value(&query.fact_value));
        }
        groups
    }
}

/// One scored pair as it arrives on the wire. The fact type stays a string
/// until validation so one unknown type cannot void the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSimilarity {
    pub value_a: String,
    pub value_b: String,
    pub fact_type: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub success: bool,
    #[serde(default)]
    pub similarities: Vec<ResolvedSimilarity>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("no similarity resolver configured")]
    Disabled,
    #[error("failed to start resolver `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("resolver exited with status {code}: {stderr}")]
    Exit { code: i32, stderr: String },
    #[error("resolver io: {0}")]
    Io(#[from] std::io::Error),
    #[error("resolver returned undecodable output: {0}")]
    Decode(#[from] serde_json::Error),
}

pub trait SimilarityResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, ResolverError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledResolver;

impl SimilarityResolver for DisabledResolver {
    fn resolve(&self, _request: &ResolveRequest) -> Result<ResolveResponse, ResolverError> {
        Err(ResolverError::Disabled)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    pub accepted: Vec<ScoredPair>,
    pub dropped: usize,
}

/// Keeps only pairs of distinct requested values of a known fact type with a
/// score in [0, 1]; everything else is counted and discarded.
pub fn validate_response(request: &ResolveRequest, response: ResolveResponse) -> Validated {
    let requested = request.grouped();
    let mut out = Validated::default();

    for item in response.similarities {
        let Some(fact_type) = FactType::parse(&item.fact_type) else {
            out.dropped += 1;
            continue;
        };
        let value_a = normalize_value(&item.value_a);
        let value_b = normalize_value(&item.value_b);
        let was_requested = requested
            .get(&fact_type)
            .is_some_and(|values| values.contains(&value_a) && values.contains(&value_b));
        let score_ok = item.score.is_finite() && (0.0..=1.0).contains(&item.score);

        if !was_requested || !score_ok || value_a == value_b {
            out.dropped += 1;
            continue;
        }
        out.accepted.push(ScoredPair {
            fact_type,
            value_a,
            value_b,
            score: item.score as f32,
        });
    }

    if out.dropped > 0 {
        debug!(dropped = out.dropped, "discarded malformed resolver entries");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(fact_type: FactType, value: &str) -> FactQuery {
        FactQuery {
            fact_type,
            fact_value: value.to_string(),
        }
    }

    fn scored(a: &str, b: &str, fact_type: &str, score: f64) -> ResolvedSimilarity {
        ResolvedSimilarity {
            value_a: a.to_string(),
            value_b: b.to_string(),
            fact_type: fact_type.to_string(),
            score,
        }
    }

    #[test]
    fn keeps_requested_pairs_and_normalizes_them() {
        let request = ResolveRequest {
            facts: vec![query(FactType::Work, "Google"), query(FactType::Work, "Alphabet")],
        };
        let response = ResolveResponse {
            success: true,
            similarities: vec![scored("GOOGLE ", "alphabet", "work", 0.8)],
        };

        let validated = validate_response(&request, response);
        assert_eq!(validated.dropped, 0);
        assert_eq!(
            validated.accepted,
            vec![ScoredPair {
                fact_type: FactType::Work,
                value_a: "google".to_string(),
                value_b: "alphabet".to_string(),
                score: 0.8,
            }]
        );
    }

    #[test]
    fn drops_malformed_entries() {
        let request = ResolveRequest {
            facts: vec![
                query(FactType::Work, "Google"),
                query(FactType::Work, "Alphabet"),
                query(FactType::Hobby, "Chess"),
            ],
        };
        let response = ResolveResponse {
            success: true,
            similarities: vec![
                scored("google", "alphabet", "work", 1.5),
                scored("google", "alphabet", "work", -0.1),
                scored("google", "alphabet", "work", f64::NAN),
                scored("google", "meta", "work", 0.7),
                scored("google", "alphabet", "hobby", 0.7),
                scored("google", "alphabet", "employer", 0.7),
                scored("chess", "Chess", "hobby", 0.9),
                scored("alphabet", "google", "work", 0.6),
            ],
        };

        let validated = validate_response(&request, response);
        assert_eq!(validated.dropped, 7);
        assert_eq!(validated.accepted.len(), 1);
        assert_eq!(validated.accepted[0].value_a, "alphabet");
    }

    #[test]
    fn response_decodes_without_similarities() {
        let response: ResolveResponse =
            serde_json::from_str(r#"{"success":false}"#).expect("decode");
        assert!(!response.success);
        assert!(response.similarities.is_empty());
    }

    #[test]
    fn disabled_resolver_is_always_unavailable() {
        let result = DisabledResolver.resolve(&ResolveRequest::default());
        assert!(matches!(result, Err(ResolverError::Disabled)));
    }
}
