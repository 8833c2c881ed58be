pub mod cache;
pub mod clock;
pub mod config;
pub mod corpus;
pub mod graph;
pub mod layout;
pub mod network;
pub mod resolver;

pub use graph::{GraphBuild, NetworkSnapshot};
pub use network::{NetworkError, RelationshipNetwork};
