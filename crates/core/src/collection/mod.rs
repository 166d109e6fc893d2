//! Collections: fundraisers owned by a parent and tied to a class group.
//!
//! - `types` - collection, participation rows and the effective-row rule
//! - `state` - status transitions and participation preconditions
//! - `engine` - transactional lifecycle operations

pub mod engine;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

pub use engine::CollectionEngine;
pub use state::CollectionStateMachine;
pub use types::{
    Collection, CollectionOperation, CollectionOperationType, CollectionStatus, CreateCollection,
    FinishOutcome, NewCollectionOperation, ParticipationStatus, UpdateCollection,
    latest_operation, latest_per_child, next_operation_date, participation_of,
    refund_recipient,
};
