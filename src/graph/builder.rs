use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::cache::SimilarityCache;
use crate::corpus::{Contact, FactCorpus};
use crate::graph::edges::{build_edges, partition_contacts};
use crate::graph::pairing::{ComparisonSet, group_values, values_needing_resolution};
use crate::graph::{
    BuildStats, GraphBuild, GraphEdge, GraphNode, NetworkSnapshot, ResolverOutcome,
};
use crate::layout::{LayoutEngine, LayoutLink};
use crate::resolver::{ResolveRequest, SimilarityResolver, validate_response};

/// Turns a contact/fact snapshot into a laid-out relationship graph.
///
/// The cache and the resolver only affect how many fuzzy edges are found;
/// neither can make a build fail.
pub struct GraphBuilder<'a> {
    cache: &'a SimilarityCache,
    resolver: &'a dyn SimilarityResolver,
    layout: &'a LayoutEngine,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        cache: &'a SimilarityCache,
        resolver: &'a dyn SimilarityResolver,
        layout: &'a LayoutEngine,
    ) -> Self {
        Self {
            cache,
            resolver,
            layout,
        }
    }

    pub fn build(
        &self,
        contacts: &[Contact],
        corpus: &FactCorpus,
        force_recalculate: bool,
    ) -> GraphBuild {
        let facts = corpus.flatten(contacts);
        let mut stats = BuildStats {
            contacts: contacts.len(),
            facts: facts.len(),
            ..BuildStats::default()
        };

        if facts.is_empty() {
            debug!(contacts = contacts.len(), "no facts; returning empty network");
            return GraphBuild {
                snapshot: NetworkSnapshot {
                    nodes: Vec::new(),
                    edges: Vec::new(),
                    unconnected_contact_ids: contacts
                        .iter()
                        .map(|contact| contact.id.clone())
                        .collect(),
                },
                stats,
            };
        }

        let mut comparisons = self.load_comparisons(force_recalculate);
        stats.cached_comparisons = comparisons.len();

        let groups = group_values(facts.iter().copied());
        let needed = values_needing_resolution(&groups, &comparisons);
        stats.requested_values = needed.len();

        if needed.len() < 2 {
            debug!(
                cached = stats.cached_comparisons,
                "every value pair already compared; skipping resolver"
            );
        } else {
            let request = ResolveRequest { facts: needed };
            self.resolve_missing(&request, &mut comparisons, &mut stats);
        }

        let edges = build_edges(contacts, corpus, &comparisons);
        let (connected, unconnected_contact_ids) = partition_contacts(contacts, &edges);
        let nodes = self.place_nodes(&connected, &edges);

        info!(
            nodes = nodes.len(),
            edges = edges.len(),
            unconnected = unconnected_contact_ids.len(),
            "built relationship network"
        );

        GraphBuild {
            snapshot: NetworkSnapshot {
                nodes,
                edges,
                unconnected_contact_ids,
            },
            stats,
        }
    }

    fn load_comparisons(&self, force_recalculate: bool) -> ComparisonSet {
        let mut comparisons = ComparisonSet::new();
        if force_recalculate {
            match self.cache.clear() {
                Ok(removed) => debug!(removed, "cleared similarity cache for recalculation"),
                Err(err) => warn!(error = %err, "failed to clear similarity cache"),
            }
            return comparisons;
        }

        match self.cache.valid_entries() {
            Ok(entries) => comparisons.extend_cached(&entries),
            Err(err) => warn!(error = %err, "similarity cache unreadable; continuing without it"),
        }
        comparisons
    }

    fn resolve_missing(
        &self,
        request: &ResolveRequest,
        comparisons: &mut ComparisonSet,
        stats: &mut BuildStats,
    ) {
        let response = match self.resolver.resolve(request) {
            Ok(response) if response.success => response,
            Ok(_) => {
                warn!(values = request.len(), "resolver reported failure; using cached scores only");
                stats.resolver = ResolverOutcome::Unavailable {
                    reason: "resolver reported failure".to_string(),
                };
                return;
            }
            Err(err) => {
                warn!(error = %err, "resolver unavailable; using cached scores only");
                stats.resolver = ResolverOutcome::Unavailable {
                    reason: err.to_string(),
                };
                return;
            }
        };

        let validated = validate_response(request, response);
        stats.resolved_comparisons = validated.accepted.len();
        stats.dropped_comparisons = validated.dropped;

        if let Err(err) = self.cache.bulk_store(&validated.accepted) {
            warn!(error = %err, "failed to persist resolved scores");
        }
        comparisons.extend_resolved(&validated.accepted);
        stats.resolver = ResolverOutcome::Resolved;
    }

    fn place_nodes(&self, connected: &[&Contact], edges: &[GraphEdge]) -> Vec<GraphNode> {
        let index = connected
            .iter()
            .enumerate()
            .map(|(position, contact)| (contact.id.as_str(), position))
            .collect::<HashMap<_, _>>();
        let links = edges
            .iter()
            .filter_map(|edge| {
                Some(LayoutLink {
                    source: *index.get(edge.source_contact_id.as_str())?,
                    target: *index.get(edge.target_contact_id.as_str())?,
                    weight: edge.similarity,
                })
            })
            .collect::<Vec<_>>();

        let positions = self.layout.layout(connected.len(), &links);
        connected
            .iter()
            .zip(positions)
            .map(|(contact, position)| GraphNode {
                id: contact.id.clone(),
                label: contact.name.clone(),
                position,
            })
            .collect()
    }
}
