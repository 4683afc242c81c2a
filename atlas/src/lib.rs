//! # Atlas Query Layer
//! Pull-based, tuple-at-a-time operators over the keystone storage engine:
//! sequential scan, filter, aggregate, and the insert/delete operators.
//! Operator trees open bottom-up and pull tuples with `next()`; leaf scans
//! fetch pages through the buffer pool under the calling transaction.

/// The aggregation operator and its grouped running state.
pub mod aggregate_executor;
/// Error taxonomy for the query layer.
pub mod errors;
/// The executor trait and the concrete operators.
pub mod executor;
/// Per-tuple comparison against a literal.
pub mod predicate;

pub use aggregate_executor::{Aggregate, AggregateOp};
pub use errors::ExecutionError;
pub use executor::dml::{Delete, Insert};
pub use executor::filter::Filter;
pub use executor::scan::SeqScan;
pub use executor::{BoxedExecutor, Executor};
pub use predicate::Predicate;
