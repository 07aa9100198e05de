//! # mnemo core
//!
//! Domain types, traits, and error definitions for the mnemo observation
//! memory. This crate does no I/O. It defines the domain model and the
//! pure pieces of the retrieval engine:
//!
//! - the classifier rule table (tool activity → type + importance)
//! - the context budgeter (greedy prefix under a token ceiling)
//! - the `ObservationStore` trait that storage backends implement

pub mod error;
pub mod session;
pub mod observation;
pub mod store;
pub mod classifier;
pub mod budget;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, StoreError};
pub use session::{NewSession, Session, SessionId, SessionMetadata};
pub use observation::{
    Importance, NewObservation, Observation, ObservationId, ObservationMetadata, ObservationType,
};
pub use store::{ContextFilter, ObservationStore, SearchHit, SearchQuery, StoreStats};
pub use classifier::{Classification, classify};
pub use budget::{BudgetSelection, select_for_budget};
pub use token::estimate_tokens;
