use std::sync::Arc;

use keystone::{Database, HeapFileIterator, TransactionId, Tuple, TupleDesc};

use crate::errors::ExecutionError;
use crate::executor::{BoxedExecutor, Executor};

/// Streams a table's heap file under the calling transaction, requesting
/// each page with `ReadOnly`.
pub struct SeqScan {
    td: TupleDesc,
    iter: HeapFileIterator,
    opened: bool,
    lookahead: Option<Tuple>,
}

impl SeqScan {
    pub fn new(
        db: Arc<Database>,
        tid: TransactionId,
        table_id: u32,
    ) -> Result<Self, ExecutionError> {
        let td = db.catalog().tuple_desc(table_id)?;
        Ok(SeqScan {
            td,
            iter: HeapFileIterator::new(db, tid, table_id),
            opened: false,
            lookahead: None,
        })
    }

    /// Looks a table up by name in the catalog first.
    pub fn by_name(
        db: Arc<Database>,
        tid: TransactionId,
        table: &str,
    ) -> Result<Self, ExecutionError> {
        let table_id = db
            .catalog()
            .table_id(table)
            .map_err(|_| ExecutionError::TableNotFound(table.to_string()))?;
        Self::new(db, tid, table_id)
    }
}

impl Executor for SeqScan {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.iter.open()?;
        self.lookahead = None;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        if self.lookahead.is_none() {
            self.lookahead = self.iter.next()?;
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
        self.iter.rewind()?;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.iter.close();
        self.lookahead = None;
        self.opened = false;
    }

    fn schema(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        Vec::new()
    }

    fn set_children(&mut self, children: Vec<BoxedExecutor>) -> Result<(), ExecutionError> {
        if children.is_empty() {
            Ok(())
        } else {
            Err(ExecutionError::Unsupported(
                "a sequential scan has no children".to_string(),
            ))
        }
    }
}
