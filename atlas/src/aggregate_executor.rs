//! The aggregation operator. Computes one aggregate over one column,
//! optionally grouped by one other column. The child is drained eagerly at
//! construction into a per-group running state keyed by the stringified
//! group value; results are emitted in key order.

use std::collections::BTreeMap;
use std::fmt;

use keystone::{Field, Tuple, TupleDesc, Type};

use crate::errors::ExecutionError;
use crate::executor::{BoxedExecutor, Executor};

/// The supported aggregation operators. Integer columns support all of
/// them; string columns support `Count` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
struct GroupState {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl Default for GroupState {
    fn default() -> Self {
        GroupState {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }
}

impl GroupState {
    fn merge(&mut self, value: &Field) {
        self.count += 1;
        if let Field::Int(v) = value {
            self.sum += *v as i64;
            self.min = self.min.min(*v);
            self.max = self.max.max(*v);
        }
    }

    fn finish(&self, op: AggregateOp) -> i32 {
        match op {
            AggregateOp::Min => self.min,
            AggregateOp::Max => self.max,
            AggregateOp::Sum => self.sum as i32,
            // integer division; the ungrouped sentinel row may have no input
            AggregateOp::Avg if self.count == 0 => 0,
            AggregateOp::Avg => (self.sum / self.count) as i32,
            AggregateOp::Count => self.count as i32,
        }
    }
}

/// Groups and aggregates the child's tuples. Output schema is
/// `[aggregateVal: int]`, or `[groupVal: <group type>, aggregateVal: int]`
/// when grouping.
pub struct Aggregate {
    child: BoxedExecutor,
    afield: usize,
    gfield: Option<usize>,
    op: AggregateOp,
    td: TupleDesc,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl Aggregate {
    pub fn new(
        mut child: BoxedExecutor,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, ExecutionError> {
        let (td, results) = Self::compute(&mut child, afield, gfield, op)?;
        Ok(Aggregate {
            child,
            afield,
            gfield,
            op,
            td,
            results,
            cursor: 0,
            opened: false,
        })
    }

    pub fn group_field(&self) -> Option<usize> {
        self.gfield
    }

    pub fn aggregate_field(&self) -> usize {
        self.afield
    }

    pub fn aggregate_op(&self) -> AggregateOp {
        self.op
    }

    fn compute(
        child: &mut BoxedExecutor,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Result<(TupleDesc, Vec<Tuple>), ExecutionError> {
        let child_td = child.schema().clone();
        let a_type = child_td
            .field_type(afield)
            .map_err(|_| ExecutionError::ColumnNotFound(format!("aggregate column {}", afield)))?;
        if a_type == Type::String && op != AggregateOp::Count {
            return Err(ExecutionError::Unsupported(format!(
                "{} over a string column",
                op
            )));
        }
        let group_type = match gfield {
            Some(g) => Some(child_td.field_type(g).map_err(|_| {
                ExecutionError::ColumnNotFound(format!("group column {}", g))
            })?),
            None => None,
        };
        let td = match group_type {
            None => TupleDesc::new(vec![(Type::Int, "aggregateVal".to_string())]),
            Some(gt) => TupleDesc::new(vec![
                (gt, "groupVal".to_string()),
                (Type::Int, "aggregateVal".to_string()),
            ]),
        };

        // group keys are stringified field values; they are reparsed into
        // the group type below when the result tuples are built
        let mut groups: BTreeMap<String, GroupState> = BTreeMap::new();
        if gfield.is_none() {
            // without grouping there is always exactly one result row,
            // even over an empty input
            groups.insert(String::new(), GroupState::default());
        }
        child.open()?;
        while child.has_next()? {
            let t = child.next()?;
            let key = match gfield {
                None => String::new(),
                Some(g) => t.field(g)?.to_string(),
            };
            groups.entry(key).or_default().merge(t.field(afield)?);
        }
        child.close();

        let mut results = Vec::with_capacity(groups.len());
        for (key, state) in &groups {
            let agg_val = Field::Int(state.finish(op));
            let tuple = match group_type {
                None => Tuple::new(td.clone(), vec![agg_val])?,
                Some(Type::Int) => {
                    let group_val = key.parse::<i32>().map_err(|_| {
                        ExecutionError::Unsupported(format!(
                            "group key {} does not reparse as an integer",
                            key
                        ))
                    })?;
                    Tuple::new(td.clone(), vec![Field::Int(group_val), agg_val])?
                }
                Some(Type::String) => {
                    Tuple::new(td.clone(), vec![Field::Str(key.clone()), agg_val])?
                }
            };
            results.push(tuple);
        }
        Ok((td, results))
    }
}

impl Executor for Aggregate {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        Ok(self.cursor < self.results.len())
    }

    fn next(&mut self) -> Result<Tuple, ExecutionError> {
        if !self.has_next()? {
            return Err(ExecutionError::NoSuchTuple);
        }
        let t = self.results[self.cursor].clone();
        self.cursor += 1;
        Ok(t)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(ExecutionError::ClosedOperator);
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn schema(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        vec![&mut self.child]
    }

    /// Swapping the child recomputes the aggregate from the new stream.
    fn set_children(&mut self, children: Vec<BoxedExecutor>) -> Result<(), ExecutionError> {
        let mut children = children;
        if children.len() != 1 {
            return Err(ExecutionError::Unsupported(format!(
                "aggregate takes exactly one child, got {}",
                children.len()
            )));
        }
        let mut child = children.pop().ok_or(ExecutionError::NoSuchTuple)?;
        let (td, results) = Self::compute(&mut child, self.afield, self.gfield, self.op)?;
        self.child = child;
        self.td = td;
        self.results = results;
        self.cursor = 0;
        Ok(())
    }
}
