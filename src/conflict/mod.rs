//! Conflict resolution for ambiguous saves
//!
//! Storage answers an ambiguous save with a candidate set. A fresh
//! `ConflictResolver` per save attempt collects one decision per conflicting
//! entity and turns them into a single `SaveRequest`.

mod resolver;
mod types;

pub use resolver::{ConflictError, ConflictResolver, ResolverState};
pub use types::{
    ConflictCandidateSet, InfluenceConflict, InfluencePreview, InfluenceResolutions, ItemPreview,
    MainItemChoice, PreviewData, Resolution, ResolutionType, SaveRequest, SimilarItem,
};
