//! Values passed through the facade.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, RwLock},
};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::facade::object::{EnumValue, Object};

/// Shared, mutable reference to an [`Object`].
pub type ObjectRef = Arc<RwLock<Object>>;

/// A dynamically typed value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// UTF-16 code unit range character
    Char(char),
    /// Signed 8-bit integer
    I8(i8),
    /// Unsigned 8-bit integer
    U8(u8),
    /// Signed 16-bit integer
    I16(i16),
    /// Unsigned 16-bit integer
    U16(u16),
    /// Signed 32-bit integer
    I32(i32),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 64-bit integer
    U64(u64),
    /// Single precision float
    F32(f32),
    /// Double precision float
    F64(f64),
    /// 128-bit decimal
    Decimal(Decimal),
    /// Text
    String(String),
    /// Date and time without a zone
    DateTime(NaiveDateTime),
    /// Member of an enumeration
    Enum(EnumValue),
    /// Ordered sequence
    List(Vec<Value>),
    /// String-keyed dictionary
    Map(BTreeMap<String, Value>),
    /// Instance of a runtime class
    Object(ObjectRef),
}

impl Value {
    /// Wrap `object` into a shared reference.
    #[must_use]
    pub fn object(object: Object) -> Value {
        Value::Object(Arc::new(RwLock::new(object)))
    }

    /// `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value's type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "System.Boolean".to_string(),
            Value::Char(_) => "System.Char".to_string(),
            Value::I8(_) => "System.SByte".to_string(),
            Value::U8(_) => "System.Byte".to_string(),
            Value::I16(_) => "System.Int16".to_string(),
            Value::U16(_) => "System.UInt16".to_string(),
            Value::I32(_) => "System.Int32".to_string(),
            Value::U32(_) => "System.UInt32".to_string(),
            Value::I64(_) => "System.Int64".to_string(),
            Value::U64(_) => "System.UInt64".to_string(),
            Value::F32(_) => "System.Single".to_string(),
            Value::F64(_) => "System.Double".to_string(),
            Value::Decimal(_) => "System.Decimal".to_string(),
            Value::String(_) => "System.String".to_string(),
            Value::DateTime(_) => "System.DateTime".to_string(),
            Value::Enum(value) => value.enum_type().name().to_string(),
            Value::List(_) => "list".to_string(),
            Value::Map(_) => "map".to_string(),
            Value::Object(object) => read_lock!(object).class().name().to_string(),
        }
    }

    /// The value as an integer, for integral, boolean, character and enum values.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Value::Bool(value) => i128::from(*value),
            Value::Char(value) => i128::from(u32::from(*value)),
            Value::I8(value) => i128::from(*value),
            Value::U8(value) => i128::from(*value),
            Value::I16(value) => i128::from(*value),
            Value::U16(value) => i128::from(*value),
            Value::I32(value) => i128::from(*value),
            Value::U32(value) => i128::from(*value),
            Value::I64(value) => i128::from(*value),
            Value::U64(value) => i128::from(*value),
            Value::Enum(value) => i128::from(value.value()),
            _ => return None,
        })
    }

    /// The text of a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Char(value) => write!(f, "{}", value),
            Value::I8(value) => write!(f, "{}", value),
            Value::U8(value) => write!(f, "{}", value),
            Value::I16(value) => write!(f, "{}", value),
            Value::U16(value) => write!(f, "{}", value),
            Value::I32(value) => write!(f, "{}", value),
            Value::U32(value) => write!(f, "{}", value),
            Value::I64(value) => write!(f, "{}", value),
            Value::U64(value) => write!(f, "{}", value),
            Value::F32(value) => write!(f, "{}", value),
            Value::F64(value) => write!(f, "{}", value),
            Value::Decimal(value) => write!(f, "{}", value),
            Value::String(value) => f.write_str(value),
            Value::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
            Value::Enum(value) => write!(f, "{}", value),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Map(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
            Value::Object(object) => f.write_str(read_lock!(object).class().name()),
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => String,
    NaiveDateTime => DateTime,
    EnumValue => Enum,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
