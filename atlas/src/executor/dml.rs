//! The mutating operators. Both are one-shot: the first `next` drains the
//! child, applies the change through the buffer pool, and emits a single
//! tuple holding the number of affected rows.

use std::sync::Arc;

use keystone::{Database, Field, TransactionId, Tuple, TupleDesc, Type};

use crate::errors::ExecutionError;
use crate::executor::{BoxedExecutor, Executor};

fn count_schema() -> TupleDesc {
    TupleDesc::from_types(&[Type::Int])
}

fn count_tuple(count: i32) -> Result<Tuple, ExecutionError> {
    Ok(Tuple::new(count_schema(), vec![Field::Int(count)])?)
}

/// Inserts every tuple the child produces into one table.
pub struct Insert {
    db: Arc<Database>,
    tid: TransactionId,
    child: BoxedExecutor,
    table_id: u32,
    td: TupleDesc,
    opened: bool,
    done: bool,
}

impl Insert {
    /// Fails up front when the child's schema does not match the table's.
    pub fn new(
        db: Arc<Database>,
        tid: TransactionId,
        child: BoxedExecutor,
        table_id: u32,
    ) -> Result<Self, ExecutionError> {
        let table_td = db.catalog().tuple_desc(table_id)?;
        if *child.schema() != table_td {
            return Err(ExecutionError::Storage(
                keystone::StorageError::SchemaMismatch(format!(
                    "child produces [{}], table stores [{}]",
                    child.schema(),
                    table_td
                )),
            ));
        }
        Ok(Insert {
            db,
            tid,
            child,
            table_id,
            td: count_schema(),
            opened: false,
            done: false,
        })
    }
}

impl Executor for Insert {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        self.done = false;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        Ok(!self.done)
    }

    fn next(&mut self) -> Result<Tuple, ExecutionError> {
        if !self.has_next()? {
            return Err(ExecutionError::NoSuchTuple);
        }
        self.done = true;
        let mut count = 0i32;
        while self.child.has_next()? {
            let t = self.child.next()?;
            // a tuple that fails to land does not stop the drain; the
            // count reports successes only
            match self.db.insert_tuple(self.tid, self.table_id, t) {
                Ok(()) => count += 1,
                Err(_err) => {
                    keystone::debug_log!("[Insert] tuple skipped: {}", _err);
                }
            }
        }
        keystone::debug_log!("[Insert] {} tuples into table {}", count, self.table_id);
        count_tuple(count)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        // one-shot: rewinding the child does not re-arm the insert
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn schema(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        vec![&mut self.child]
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) -> Result<(), ExecutionError> {
        let mut children = children;
        if children.len() != 1 {
            return Err(ExecutionError::Unsupported(format!(
                "insert takes exactly one child, got {}",
                children.len()
            )));
        }
        self.child = children.pop().ok_or(ExecutionError::NoSuchTuple)?;
        Ok(())
    }
}

/// Deletes every tuple the child produces, addressed by record id.
pub struct Delete {
    db: Arc<Database>,
    tid: TransactionId,
    child: BoxedExecutor,
    td: TupleDesc,
    opened: bool,
    done: bool,
}

impl Delete {
    pub fn new(db: Arc<Database>, tid: TransactionId, child: BoxedExecutor) -> Self {
        Delete {
            db,
            tid,
            child,
            td: count_schema(),
            opened: false,
            done: false,
        }
    }
}

impl Executor for Delete {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        self.done = false;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        Ok(!self.done)
    }

    fn next(&mut self) -> Result<Tuple, ExecutionError> {
        if !self.has_next()? {
            return Err(ExecutionError::NoSuchTuple);
        }
        self.done = true;
        let mut count = 0i32;
        while self.child.has_next()? {
            let t = self.child.next()?;
            match self.db.delete_tuple(self.tid, &t) {
                Ok(()) => count += 1,
                Err(_err) => {
                    keystone::debug_log!("[Delete] tuple skipped: {}", _err);
                }
            }
        }
        keystone::debug_log!("[Delete] {} tuples removed", count);
        count_tuple(count)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn schema(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        vec![&mut self.child]
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) -> Result<(), ExecutionError> {
        let mut children = children;
        if children.len() != 1 {
            return Err(ExecutionError::Unsupported(format!(
                "delete takes exactly one child, got {}",
                children.len()
            )));
        }
        self.child = children.pop().ok_or(ExecutionError::NoSuchTuple)?;
        Ok(())
    }
}
