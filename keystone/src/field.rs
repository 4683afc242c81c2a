use std::fmt;

use crate::errors::StorageError;
use crate::STRING_LEN;

/// The closed set of primitive value kinds a column may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
}

impl Type {
    /// The serialized width of a field of this type, in bytes.
    pub fn len(&self) -> usize {
        match self {
            Type::Int => 4,
            Type::String => 4 + STRING_LEN,
        }
    }

    /// Parses one field out of `buf`, which must hold at least `self.len()`
    /// bytes. Integers are big-endian; strings carry a big-endian length
    /// prefix followed by a zero-padded payload of `STRING_LEN` bytes.
    pub fn parse(&self, buf: &[u8]) -> Result<Field, StorageError> {
        if buf.len() < self.len() {
            return Err(StorageError::SchemaMismatch(format!(
                "field needs {} bytes, got {}",
                self.len(),
                buf.len()
            )));
        }
        match self {
            Type::Int => {
                let raw: [u8; 4] = buf[0..4].try_into().map_err(|_| {
                    StorageError::SchemaMismatch("short integer field".to_string())
                })?;
                Ok(Field::Int(i32::from_be_bytes(raw)))
            }
            Type::String => {
                let raw: [u8; 4] = buf[0..4].try_into().map_err(|_| {
                    StorageError::SchemaMismatch("short string length prefix".to_string())
                })?;
                let len = (u32::from_be_bytes(raw) as usize).min(STRING_LEN);
                let value = String::from_utf8_lossy(&buf[4..4 + len]).into_owned();
                Ok(Field::Str(value))
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
        }
    }
}

/// Comparison operators understood by `Field::compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    Like,
    NotEquals,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            Op::Equals => "=",
            Op::GreaterThan => ">",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThanOrEq => ">=",
            Op::Like => "LIKE",
            Op::NotEquals => "<>",
        };
        write!(f, "{}", sym)
    }
}

/// A typed column value. Strings wider than `STRING_LEN` bytes are
/// truncated when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::String,
        }
    }

    /// Appends this field's on-disk encoding to `out`.
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Str(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                out.extend_from_slice(&(len as u32).to_be_bytes());
                out.extend_from_slice(&bytes[..len]);
                out.extend(std::iter::repeat(0u8).take(STRING_LEN - len));
            }
        }
    }

    /// Compares this field against `other` under `op`. `Like` on strings is
    /// substring containment; on integers it coincides with equality.
    /// Comparing fields of different types is always false.
    pub fn compare(&self, op: Op, other: &Field) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => match op {
                Op::Equals | Op::Like => a == b,
                Op::NotEquals => a != b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
            },
            (Field::Str(a), Field::Str(b)) => match op {
                Op::Equals => a == b,
                Op::NotEquals => a != b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::Like => a.contains(b.as_str()),
            },
            _ => false,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_field_round_trips() {
        let field = Field::Int(-7_340_031);
        let mut buf = Vec::new();
        field.serialize_into(&mut buf);
        assert_eq!(buf.len(), Type::Int.len());
        assert_eq!(Type::Int.parse(&buf).unwrap(), field);
    }

    #[test]
    fn string_field_round_trips_and_pads() {
        let field = Field::Str("hello".to_string());
        let mut buf = Vec::new();
        field.serialize_into(&mut buf);
        assert_eq!(buf.len(), Type::String.len());
        // payload beyond the prefix + value must be zero
        assert!(buf[4 + 5..].iter().all(|b| *b == 0));
        assert_eq!(Type::String.parse(&buf).unwrap(), field);
    }

    #[test]
    fn oversized_string_is_truncated_on_serialize() {
        let long = "x".repeat(STRING_LEN + 40);
        let field = Field::Str(long);
        let mut buf = Vec::new();
        field.serialize_into(&mut buf);
        assert_eq!(buf.len(), Type::String.len());
        match Type::String.parse(&buf).unwrap() {
            Field::Str(s) => assert_eq!(s.len(), STRING_LEN),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn integer_comparisons() {
        let three = Field::Int(3);
        let five = Field::Int(5);
        assert!(three.compare(Op::LessThan, &five));
        assert!(three.compare(Op::LessThanOrEq, &five));
        assert!(five.compare(Op::GreaterThan, &three));
        assert!(five.compare(Op::GreaterThanOrEq, &five));
        assert!(three.compare(Op::NotEquals, &five));
        assert!(!three.compare(Op::Equals, &five));
        // integer LIKE degenerates to equality
        assert!(five.compare(Op::Like, &Field::Int(5)));
        assert!(!five.compare(Op::Like, &three));
    }

    #[test]
    fn string_like_is_substring_containment() {
        let hay = Field::Str("warehouse".to_string());
        assert!(hay.compare(Op::Like, &Field::Str("house".to_string())));
        assert!(hay.compare(Op::Like, &Field::Str("".to_string())));
        assert!(!hay.compare(Op::Like, &Field::Str("mouse".to_string())));
    }

    #[test]
    fn cross_type_comparison_is_false() {
        let n = Field::Int(1);
        let s = Field::Str("1".to_string());
        assert!(!n.compare(Op::Equals, &s));
        assert!(!s.compare(Op::Equals, &n));
    }
}
