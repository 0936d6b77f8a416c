//! Save flow and the graph session built on it

mod save;
mod session;

pub use save::{SaveError, SaveOrchestrator, SaveOutcome, SavedGraph};
pub use session::{GraphSession, LoadReport};
