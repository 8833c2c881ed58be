pub mod builder;
pub mod edges;
pub mod pairing;

use serde::Serialize;

use crate::corpus::FactType;

pub use builder::GraphBuilder;
pub use edges::{SIMILARITY_THRESHOLD, build_edges, partition_contacts};
pub use pairing::{ComparisonSet, group_values, values_needing_resolution};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source_contact_id: String,
    pub target_contact_id: String,
    pub fact_type: FactType,
    pub label: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub position: Point,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub unconnected_contact_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolverOutcome {
    #[default]
    Skipped,
    Resolved,
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub contacts: usize,
    pub facts: usize,
    pub cached_comparisons: usize,
    pub requested_values: usize,
    pub resolved_comparisons: usize,
    pub dropped_comparisons: usize,
    pub resolver: ResolverOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphBuild {
    pub snapshot: NetworkSnapshot,
    pub stats: BuildStats,
}
