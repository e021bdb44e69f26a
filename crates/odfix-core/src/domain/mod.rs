//! Domain models for odfix.
//!
//! Canonical definitions for the core entities:
//! - `CausalChain`: ordered dependency chain for one victim
//! - `VictimCase`: a victim with its expectation and chains
//! - `Status`: the outcome lattice
//! - `PatchRecord` / `AggregateResult`: append-only attempt records

pub mod chain;
pub mod error;
pub mod record;
pub mod status;

// Re-export main types and errors
pub use chain::{
    class_of, merge_cases, method_of, same_test_class, CausalChain, CleanerGroup, CleanerInfo,
    Expectation, FlakyClass, TestId, VictimCase,
};
pub use error::{CollaboratorError, OdfixError, Result};
pub use record::{AggregateResult, OperationTime, PatchRecord, Stopwatch, NO_CANDIDATE};
pub use status::{Removability, Status};
