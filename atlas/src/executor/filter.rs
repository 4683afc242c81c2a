use keystone::{Tuple, TupleDesc};

use crate::errors::ExecutionError;
use crate::executor::{BoxedExecutor, Executor};
use crate::predicate::Predicate;

/// Emits the child's tuples that satisfy a predicate.
pub struct Filter {
    predicate: Predicate,
    child: BoxedExecutor,
    opened: bool,
    lookahead: Option<Tuple>,
}

impl Filter {
    pub fn new(predicate: Predicate, child: BoxedExecutor) -> Self {
        Filter {
            predicate,
            child,
            opened: false,
            lookahead: None,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        while self.child.has_next()? {
            let t = self.child.next()?;
            if self.predicate.filter(&t)? {
                return Ok(Some(t));
            }
        }
        Ok(None)
    }
}

impl Executor for Filter {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        self.lookahead = None;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        if self.lookahead.is_none() {
            self.lookahead = self.fetch_next()?;
        }
        Ok(self.lookahead.is_some())
    }

    fn next(&mut self) -> Result<Tuple, ExecutionError> {
        if !self.has_next()? {
            return Err(ExecutionError::NoSuchTuple);
        }
        self.lookahead.take().ok_or(ExecutionError::NoSuchTuple)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        self.child.rewind()?;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.lookahead = None;
        self.opened = false;
    }

    fn schema(&self) -> &TupleDesc {
        self.child.schema()
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        vec![&mut self.child]
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) -> Result<(), ExecutionError> {
        let mut children = children;
        if children.len() != 1 {
            return Err(ExecutionError::Unsupported(format!(
                "filter takes exactly one child, got {}",
                children.len()
            )));
        }
        self.child = children.pop().ok_or(ExecutionError::NoSuchTuple)?;
        Ok(())
    }
}
