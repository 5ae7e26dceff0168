use std::{cmp::Ordering, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::parser::ast::Consts,
};

/// Column types accepted by CREATE TABLE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Int,
    Varchar,
    Text,
    Date,
    Datetime,
    Decimal,
    Boolean,
    Timestamp,
}

impl DataType {
    /// Resolves a type name as written in a column definition (case-insensitive)
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name.to_uppercase().as_ref() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" => DataType::Int,
            "VARCHAR" | "CHAR" => DataType::Varchar,
            "TEXT" => DataType::Text,
            "DATE" => DataType::Date,
            "DATETIME" => DataType::Datetime,
            "DECIMAL" | "NUMERIC" | "FLOAT" | "DOUBLE" => DataType::Decimal,
            "BOOLEAN" | "BOOL" => DataType::Boolean,
            "TIMESTAMP" => DataType::Timestamp,
            other => return Err(Error::Parse(format!("Unsupported data type: {}", other))),
        })
    }

    /// Converts a supplied value into the representation stored for this type.
    ///
    /// INT and DECIMAL truncate to an integer when the value is numeric and
    /// keep it untouched otherwise. Textual types store the display form.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (DataType::Int | DataType::Decimal, Value::Float(f)) => Value::Integer(f.trunc() as i64),
            (DataType::Int | DataType::Decimal, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Value::Integer(f.trunc() as i64),
                _ => Value::String(s),
            },
            (DataType::Boolean, Value::Integer(i)) => Value::Boolean(i != 0),
            (DataType::Boolean, Value::String(s)) => match s.to_lowercase().as_ref() {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => Value::String(s),
            },
            (
                DataType::Varchar | DataType::Text | DataType::Date | DataType::Datetime | DataType::Timestamp,
                v @ (Value::Integer(_) | Value::Float(_) | Value::Boolean(_)),
            ) => Value::String(v.to_text()),
            (_, v) => v,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DataType::Int => "INT",
            DataType::Varchar => "VARCHAR",
            DataType::Text => "TEXT",
            DataType::Date => "DATE",
            DataType::Datetime => "DATETIME",
            DataType::Decimal => "DECIMAL",
            DataType::Boolean => "BOOLEAN",
            DataType::Timestamp => "TIMESTAMP",
        })
    }
}

/// Scalar cell value
///
/// Serialized untagged so a row reads as a plain JSON object in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Creates a Value from a parsed literal
    pub fn from_consts(c: Consts) -> Self {
        match c {
            Consts::Null => Self::Null,
            Consts::Boolean(b) => Self::Boolean(b),
            Consts::Integer(i) => Self::Integer(i),
            Consts::Float(f) => Self::Float(f),
            Consts::String(s) => Self::String(s),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value; strings count when they parse as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            Value::Null | Value::Boolean(_) => None,
        }
    }

    /// Stringified form used for join keys and textual comparison
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Equality as used by WHERE/HAVING `=`: numeric when both sides are
    /// numeric, otherwise on the stringified form. NULL never matches.
    pub fn loose_eq(&self, other: &Value) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_text() == other.to_text(),
        }
    }

    /// Total ordering for ORDER BY: numbers before booleans before strings,
    /// NULL lowest.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Integer(_) | Value::Float(_) => 1,
                Value::Boolean(_) => 2,
                Value::String(_) => 3,
            }
        }
        match self.partial_cmp(other) {
            Some(o) => o,
            None => rank(self).cmp(&rank(other)),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) if *b => write!(f, "TRUE"),
            Value::Boolean(_) => write!(f, "FALSE"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v),
        }
    }
}

/// Implements partial ordering for Value comparison (used by ORDER BY)
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (_, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DataType, Value};

    #[test]
    fn test_coerce_numeric_columns() {
        assert_eq!(DataType::Int.coerce(Value::String("42".into())), Value::Integer(42));
        assert_eq!(DataType::Decimal.coerce(Value::Float(120.5)), Value::Integer(120));
        assert_eq!(DataType::Int.coerce(Value::String("abc".into())), Value::String("abc".into()));
        assert_eq!(DataType::Int.coerce(Value::Null), Value::Null);
        assert_eq!(DataType::Varchar.coerce(Value::Integer(7)), Value::String("7".into()));
        assert_eq!(DataType::Boolean.coerce(Value::String("TRUE".into())), Value::Boolean(true));
    }

    #[test]
    fn test_loose_eq() {
        assert!(Value::Integer(1).loose_eq(&Value::String("1".into())));
        assert!(Value::Integer(200).loose_eq(&Value::String("200.00".into())));
        assert!(Value::String("a".into()).loose_eq(&Value::String("a".into())));
        assert!(!Value::Null.loose_eq(&Value::Null));
        assert!(Value::Boolean(true).loose_eq(&Value::Boolean(true)));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(DataType::from_name("varchar").ok(), Some(DataType::Varchar));
        assert_eq!(DataType::from_name("Integer").ok(), Some(DataType::Int));
        assert!(DataType::from_name("BLOB").is_err());
    }

    #[test]
    fn test_untagged_serde() -> crate::error::Result<()> {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 2.5, "x"]"#)?;
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(3),
                Value::Float(2.5),
                Value::String("x".into())
            ]
        );
        Ok(())
    }
}
