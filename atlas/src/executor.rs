//! The pull-based operator interface.
//!
//! An operator tree opens bottom-up; `next()` pulls one tuple at a time
//! from the children. `has_next` is idempotent: implementations keep a
//! one-tuple lookahead so probing does not consume the stream. Operators
//! reference their children, never their parents, and expose them through
//! the two-way `children`/`set_children` accessors so a planner can rewrite
//! a tree in place.

pub mod dml;
pub mod filter;
pub mod scan;

use keystone::{Tuple, TupleDesc};

use crate::errors::ExecutionError;

/// An operator in a query tree, boxed for composition.
pub type BoxedExecutor = Box<dyn Executor + Send>;

/// The capability set every operator provides. `open` must be called
/// before `has_next`/`next`; after `close` those calls fail
/// `ClosedOperator`; `next` past end-of-stream fails `NoSuchTuple`.
pub trait Executor: Send {
    fn open(&mut self) -> Result<(), ExecutionError>;

    fn has_next(&mut self) -> Result<bool, ExecutionError>;

    fn next(&mut self) -> Result<Tuple, ExecutionError>;

    /// Resets the stream to its beginning.
    fn rewind(&mut self) -> Result<(), ExecutionError>;

    fn close(&mut self);

    /// The schema of the tuples this operator emits.
    fn schema(&self) -> &TupleDesc;

    /// This operator's children, leaves first in tree order.
    fn children(&mut self) -> Vec<&mut BoxedExecutor>;

    /// Replaces this operator's children; the count must match.
    fn set_children(&mut self, children: Vec<BoxedExecutor>) -> Result<(), ExecutionError>;
}
