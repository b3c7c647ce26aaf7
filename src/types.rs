// SQL type codes and dynamic values.
//
// The record layer stores values of varying static type behind one tagged
// variant. Comparisons across the integer widths first widen both sides to
// 64 bits, and hashing widens the same way so equal numbers hash equally.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};

/// Stable integer codes for schema types, JDBC-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Integer,
    Varchar,
    Boolean,
    Long,
    Short,
    Date,
}

impl SqlType {
    pub fn code(self) -> i32 {
        match self {
            SqlType::Integer => 4,
            SqlType::Varchar => 12,
            SqlType::Boolean => 16,
            SqlType::Long => -5,
            SqlType::Short => 5,
            SqlType::Date => 91,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            4 => Some(SqlType::Integer),
            12 => Some(SqlType::Varchar),
            16 => Some(SqlType::Boolean),
            -5 => Some(SqlType::Long),
            5 => Some(SqlType::Short),
            91 => Some(SqlType::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Short(i16),
    Varchar(String),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl Value {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Int(_) => SqlType::Integer,
            Value::Long(_) => SqlType::Long,
            Value::Short(_) => SqlType::Short,
            Value::Varchar(_) => SqlType::Varchar,
            Value::Boolean(_) => SqlType::Boolean,
            Value::Date(_) => SqlType::Date,
        }
    }

    pub fn type_code(&self) -> i32 {
        self.sql_type().code()
    }

    /// All integer widths collapse to i64 for comparison and hashing.
    fn as_widened_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            Value::Short(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_widened_int(), other.as_widened_int()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (Value::Varchar(a), Value::Varchar(b)) => a == b,
                (Value::Boolean(a), Value::Boolean(b)) => a == b,
                (Value::Date(a), Value::Date(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.as_widened_int(), other.as_widened_int()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => match (self, other) {
                (Value::Varchar(a), Value::Varchar(b)) => Some(a.cmp(b)),
                (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
                (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
                _ => None,
            },
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(widened) = self.as_widened_int() {
            0u8.hash(state);
            widened.hash(state);
            return;
        }
        match self {
            Value::Varchar(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Value::Boolean(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Date(d) => {
                3u8.hash(state);
                d.timestamp().hash(state);
            }
            // Integer variants were handled by the widened path.
            Value::Int(_) | Value::Long(_) | Value::Short(_) => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Varchar(s) => write!(f, "'{s}'"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}
