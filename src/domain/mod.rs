pub mod message;
pub mod types;

pub use message::{ObjectReference, QueuedMessage, RecordError};
pub use types::{BatchOutcome, ClassificationResult, OutboundEvent};
