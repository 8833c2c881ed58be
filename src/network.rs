use tracing::{error, info};

use crate::cache::SimilarityCache;
use crate::corpus::{ContactStore, FactCorpus, StoreError};
use crate::graph::{GraphBuild, GraphBuilder};
use crate::layout::LayoutEngine;
use crate::resolver::SimilarityResolver;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("could not compute the network")]
    StoreUnavailable(#[source] StoreError),
}

/// Entry point a host calls to (re)build the relationship network.
///
/// Each call rebuilds from scratch and returns a new snapshot; overlapping
/// calls are independent and the latest result should win.
pub struct RelationshipNetwork {
    contacts: Box<dyn ContactStore>,
    cache: SimilarityCache,
    resolver: Box<dyn SimilarityResolver>,
    layout: LayoutEngine,
}

impl RelationshipNetwork {
    pub fn new(
        contacts: Box<dyn ContactStore>,
        cache: SimilarityCache,
        resolver: Box<dyn SimilarityResolver>,
        layout: LayoutEngine,
    ) -> Self {
        Self {
            contacts,
            cache,
            resolver,
            layout,
        }
    }

    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    pub fn build_graph(&self, force_recalculate: bool) -> Result<GraphBuild, NetworkError> {
        let contacts = self.contacts.list_contacts().map_err(|err| {
            error!(error = %err, "failed to list contacts");
            NetworkError::StoreUnavailable(err)
        })?;
        let corpus = FactCorpus::load(self.contacts.as_ref(), &contacts).map_err(|err| {
            error!(error = %err, "failed to load contact facts");
            NetworkError::StoreUnavailable(err)
        })?;

        info!(
            contacts = contacts.len(),
            force_recalculate, "rebuilding relationship network"
        );
        let builder = GraphBuilder::new(&self.cache, self.resolver.as_ref(), &self.layout);
        Ok(builder.build(&contacts, &corpus, force_recalculate))
    }

    /// Pull-to-refresh: reuse every fresh cached score.
    pub fn refresh(&self) -> Result<GraphBuild, NetworkError> {
        self.build_graph(false)
    }

    /// Explicit recalculation: drop the cache and rescore everything.
    pub fn force_refresh(&self) -> Result<GraphBuild, NetworkError> {
        self.build_graph(true)
    }
}
