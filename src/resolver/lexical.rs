use std::collections::HashSet;

use crate::resolver::{
    ResolveRequest, ResolveResponse, ResolvedSimilarity, ResolverError, SimilarityResolver,
};

pub const DEFAULT_GRAM: usize = 3;

/// Offline scorer: Jaccard overlap of character n-grams. Catches spelling
/// variants and suffixes ("acme" / "acme corp"), not synonyms.
#[derive(Debug, Clone, Copy)]
pub struct LexicalResolver {
    gram: usize,
}

impl Default for LexicalResolver {
    fn default() -> Self {
        Self { gram: DEFAULT_GRAM }
    }
}

impl LexicalResolver {
    pub fn new(gram: usize) -> Self {
        Self { gram: gram.max(1) }
    }
}

impl SimilarityResolver for LexicalResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, ResolverError> {
        let mut similarities = Vec::new();
        for (fact_type, values) in request.grouped() {
            let values = values.into_iter().collect::<Vec<_>>();
            let features = values
                .iter()
                .map(|value| gram_features(value, self.gram))
                .collect::<Vec<_>>();
            for i in 0..values.len() {
                for j in (i + 1)..values.len() {
                    similarities.push(ResolvedSimilarity {
                        value_a: values[i].clone(),
                        value_b: values[j].clone(),
                        fact_type: fact_type.as_str().to_string(),
                        score: f64::from(jaccard(&features[i], &features[j])),
                    });
                }
            }
        }
        Ok(ResolveResponse {
            success: true,
            similarities,
        })
    }
}

pub fn lexical_similarity(left: &str, right: &str) -> f32 {
    jaccard(
        &gram_features(left, DEFAULT_GRAM),
        &gram_features(right, DEFAULT_GRAM),
    )
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// Each token is padded so short words still yield grams and word boundaries
// count towards the overlap.
fn gram_features(text: &str, gram: usize) -> HashSet<String> {
    let mut out = HashSet::new();
    for token in tokenize(text) {
        let padded = format!(" {token} ").chars().collect::<Vec<_>>();
        if padded.len() <= gram {
            out.insert(padded.iter().collect());
            continue;
        }
        for window in padded.windows(gram) {
            out.insert(window.iter().collect());
        }
    }
    out
}

fn jaccard(left: &HashSet<String>, right: &HashSet<String>) -> f32 {
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(right).count() as f32 / union as f32
}
