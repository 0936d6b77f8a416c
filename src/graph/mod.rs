//! Core graph data structures

mod accumulated;
mod identity;
mod item;
mod link;


pub use accumulated::{AccumulatedGraph, DanglingEdgeWarning, GraphAction, GraphBatch, MergeResult};
pub use identity::resolve_existing_id;
pub use item::{GraphNode, Item, ItemId, NodeLayout, VerificationStatus};
pub use link::{GraphLink, LinkKey};

pub(crate) use link::clamp_confidence;
