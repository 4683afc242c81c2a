use std::fmt;

use keystone::{Field, Op, StorageError, Tuple};

/// Compares one column of each tuple against a literal operand.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Predicate { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// True when `t`'s selected column satisfies `column op operand`.
    pub fn filter(&self, t: &Tuple) -> Result<bool, StorageError> {
        Ok(t.field(self.field)?.compare(self.op, &self.operand))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "f = {} op = {} operand = {}",
            self.field, self.op, self.operand
        )
    }
}
