//! Influence Graph: a deduplicated graph of what influenced what
//!
//! Keeps one consistent graph of items and directed influence links alive
//! across many independent, overlapping fetches, and decides whether newly
//! researched data refers to entities storage already knows before it is
//! committed.
//!
//! # Core Concepts
//!
//! - **Accumulated graph**: immutable-value graph; every operation returns a new one
//! - **Conflict resolver**: per-entity create-or-merge decisions for an ambiguous save
//! - **Save orchestrator**: save → resolve → commit → fold into the graph
//! - **Influence store**: the storage boundary (`MemoryStore` bundled)
//!
//! # Example
//!
//! ```
//! use influence_graph::{AccumulatedGraph, GraphBatch, GraphLink, Item};
//!
//! let batch = GraphBatch::new()
//!     .with_center("a")
//!     .with_node(Item::new("a", "Amen, Brother"))
//!     .with_node(Item::new("b", "Straight Outta Compton"))
//!     .with_link(GraphLink::new("a", "b"));
//!
//! let graph = AccumulatedGraph::new().merge(&batch).graph;
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.link_count(), 1);
//! ```

pub mod config;
pub mod conflict;
mod graph;
pub mod orchestrator;
pub mod storage;

pub use config::{load_config, Config, ConfigError};
pub use conflict::{
    ConflictCandidateSet, ConflictError, ConflictResolver, MainItemChoice, Resolution,
    ResolutionType, ResolverState, SaveRequest, SimilarItem,
};
pub use graph::{
    resolve_existing_id, AccumulatedGraph, DanglingEdgeWarning, GraphAction, GraphBatch, GraphLink,
    GraphNode, Item, ItemId, LinkKey, MergeResult, NodeLayout, VerificationStatus,
};
pub use orchestrator::{
    GraphSession, LoadReport, SaveError, SaveOrchestrator, SaveOutcome, SavedGraph,
};
pub use storage::{
    Direction, InfluenceStore, MemoryStore, ProposedInfluence, SavePayload, SaveResponse,
    StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
