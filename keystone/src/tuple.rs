use std::fmt;

use crate::errors::StorageError;
use crate::field::{Field, Type};
use crate::page::HeapPageId;

/// The ordered schema of a tuple: one `(Type, name)` item per column.
/// A descriptor always has at least one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    items: Vec<(Type, String)>,
}

impl TupleDesc {
    pub fn new(items: Vec<(Type, String)>) -> Self {
        assert!(!items.is_empty(), "a tuple descriptor needs at least one column");
        TupleDesc { items }
    }

    /// Builds a descriptor with anonymous columns named after their types.
    pub fn from_types(types: &[Type]) -> Self {
        Self::new(types.iter().map(|t| (*t, t.to_string())).collect())
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> Result<Type, StorageError> {
        self.items
            .get(i)
            .map(|(t, _)| *t)
            .ok_or_else(|| StorageError::NotFound(format!("field index {}", i)))
    }

    pub fn field_name(&self, i: usize) -> Result<&str, StorageError> {
        self.items
            .get(i)
            .map(|(_, n)| n.as_str())
            .ok_or_else(|| StorageError::NotFound(format!("field index {}", i)))
    }

    /// Index of the first column with the given name.
    pub fn field_index(&self, name: &str) -> Result<usize, StorageError> {
        self.items
            .iter()
            .position(|(_, n)| n == name)
            .ok_or_else(|| StorageError::NotFound(format!("field named {}", name)))
    }

    /// The serialized width of a tuple with this schema, in bytes.
    pub fn size(&self) -> usize {
        self.items.iter().map(|(t, _)| t.len()).sum()
    }

    /// Concatenates two descriptors, `a`'s columns first.
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        let mut items = a.items.clone();
        items.extend(b.items.iter().cloned());
        TupleDesc { items }
    }
}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cols: Vec<String> = self
            .items
            .iter()
            .map(|(t, n)| format!("{}({})", n, t))
            .collect();
        write!(f, "{}", cols.join(", "))
    }
}

/// The on-disk address of a tuple: a page plus a slot index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: HeapPageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(pid: HeapPageId, slot: usize) -> Self {
        RecordId { pid, slot }
    }
}

/// A row: field values bound to a schema, plus the slot address once the
/// tuple resides on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    td: TupleDesc,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(td: TupleDesc, fields: Vec<Field>) -> Result<Self, StorageError> {
        if fields.len() != td.num_fields() {
            return Err(StorageError::SchemaMismatch(format!(
                "{} fields for a {}-column schema",
                fields.len(),
                td.num_fields()
            )));
        }
        for (i, f) in fields.iter().enumerate() {
            if f.field_type() != td.field_type(i)? {
                return Err(StorageError::SchemaMismatch(format!(
                    "column {} expects {}, got {}",
                    i,
                    td.field_type(i)?,
                    f.field_type()
                )));
            }
        }
        Ok(Tuple {
            td,
            fields,
            record_id: None,
        })
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn field(&self, i: usize) -> Result<&Field, StorageError> {
        self.fields
            .get(i)
            .ok_or_else(|| StorageError::NotFound(format!("field index {}", i)))
    }

    /// Replaces the value in column `i`. The new value must keep the
    /// column's type.
    pub fn set_field(&mut self, i: usize, value: Field) -> Result<(), StorageError> {
        if value.field_type() != self.td.field_type(i)? {
            return Err(StorageError::SchemaMismatch(format!(
                "column {} expects {}, got {}",
                i,
                self.td.field_type(i)?,
                value.field_type()
            )));
        }
        self.fields[i] = value;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// True when both tuples hold the same values column by column. Record
    /// ids are not considered.
    pub fn fields_eq(&self, other: &Tuple) -> bool {
        self.fields == other.fields
    }

    /// Appends the concatenated field encodings to `out`, schema order.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        for f in &self.fields {
            f.serialize_into(out);
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vals: Vec<String> = self.fields.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", vals.join("\t"))
    }
}
