//! Runtime value types exchanged with the backing store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;

/// A runtime value held in an entity slot or a stored column.
///
/// Timestamps keep millisecond precision so a value read back from storage
/// compares equal to the value that was written.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string (used by both `string` and `text` columns).
    String(String),
    /// Timestamp as milliseconds since Unix epoch.
    Timestamp(i64),
    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the runtime kind, used in type mismatch reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Bytes(_) => "binary",
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as timestamp millis.
    pub fn as_timestamp_millis(&self) -> Option<i64> {
        match self {
            Value::Timestamp(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Try to get as a UTC datetime.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.as_timestamp_millis()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "'{s}'"),
            Value::Timestamp(ms) => match Utc.timestamp_millis_opt(*ms).single() {
                Some(dt) => write!(f, "{}", dt.to_rfc3339()),
                None => write!(f, "{ms}ms"),
            },
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.timestamp_millis())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Declared kind of a mapped property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum ValueKind {
    /// Short string.
    String,
    /// Long text.
    Text,
    /// 32-bit integer range, stored as i64.
    Integer,
    /// 64-bit integer.
    Long,
    /// Single precision float, stored as f64.
    Float,
    /// Double precision float.
    Double,
    /// Boolean.
    Boolean,
    /// Point in time with millisecond precision.
    Timestamp,
    /// Calendar date, stored as the timestamp of its UTC midnight.
    Date,
    /// Raw bytes.
    Binary,
}

impl ValueKind {
    /// All kinds, in declaration order.
    pub const ALL: [ValueKind; 10] = [
        ValueKind::String,
        ValueKind::Text,
        ValueKind::Integer,
        ValueKind::Long,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Boolean,
        ValueKind::Timestamp,
        ValueKind::Date,
        ValueKind::Binary,
    ];

    /// The declared type name.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Boolean => "boolean",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Date => "date",
            ValueKind::Binary => "binary",
        }
    }

    /// Check a non-null value against this kind.
    ///
    /// Returns the value to store: unchanged when it already matches, widened
    /// when an integer is written to a floating point slot, truncated to UTC
    /// midnight for dates, `None` when the value cannot be stored under this
    /// kind.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ValueKind::String | ValueKind::Text, Value::String(_)) => Some(value.clone()),
            (ValueKind::Integer, Value::Integer(i)) => {
                i32::try_from(*i).ok().map(|_| value.clone())
            }
            (ValueKind::Long, Value::Integer(_)) => Some(value.clone()),
            (ValueKind::Float | ValueKind::Double, Value::Float(_)) => Some(value.clone()),
            (ValueKind::Float | ValueKind::Double, Value::Integer(i)) => {
                Some(Value::Float(*i as f64))
            }
            (ValueKind::Boolean, Value::Bool(_)) => Some(value.clone()),
            (ValueKind::Timestamp, Value::Timestamp(_)) => Some(value.clone()),
            (ValueKind::Date, Value::Timestamp(ms)) => {
                Some(Value::Timestamp(ms - ms.rem_euclid(MILLIS_PER_DAY)))
            }
            (ValueKind::Binary, Value::Bytes(_)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "string" | "varchar" => Ok(ValueKind::String),
            "text" | "clob" => Ok(ValueKind::Text),
            "integer" | "int" => Ok(ValueKind::Integer),
            "long" | "bigint" => Ok(ValueKind::Long),
            "float" => Ok(ValueKind::Float),
            "double" => Ok(ValueKind::Double),
            "boolean" | "bool" => Ok(ValueKind::Boolean),
            "timestamp" | "datetime" => Ok(ValueKind::Timestamp),
            "date" => Ok(ValueKind::Date),
            "binary" | "blob" => Ok(ValueKind::Binary),
            _ => Err(Error::UnknownKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(100).as_i64(), Some(100));
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0)); // Widening conversion
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_value_conversions() {
        let v: Value = 42i32.into();
        assert_eq!(v, Value::Integer(42));

        let v: Value = "hello".into();
        assert_eq!(v, Value::String("hello".into()));

        let v: Value = None::<i64>.into();
        assert_eq!(v, Value::Null);

        let dt = Utc.timestamp_millis_opt(123_456_789_000).unwrap();
        let v: Value = dt.into();
        assert_eq!(v, Value::Timestamp(123_456_789_000));
        assert_eq!(v.as_datetime(), Some(dt));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("string".parse::<ValueKind>().unwrap(), ValueKind::String);
        assert_eq!("Timestamp".parse::<ValueKind>().unwrap(), ValueKind::Timestamp);
        assert_eq!(" text ".parse::<ValueKind>().unwrap(), ValueKind::Text);
        assert!("uuid-ish".parse::<ValueKind>().is_err());

        for kind in ValueKind::ALL {
            assert_eq!(kind.name().parse::<ValueKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_coercion() {
        assert!(ValueKind::String.coerce(&Value::Integer(42)).is_none());
        assert!(ValueKind::String.coerce(&Value::Timestamp(0)).is_none());
        assert_eq!(
            ValueKind::Double.coerce(&Value::Integer(3)),
            Some(Value::Float(3.0))
        );
        assert!(ValueKind::Integer.coerce(&Value::Integer(i64::MAX)).is_none());
        assert!(ValueKind::Long.coerce(&Value::Integer(i64::MAX)).is_some());
        assert!(ValueKind::Integer.coerce(&Value::Float(1.5)).is_none());
    }

    #[test]
    fn test_dates_truncate_to_midnight() {
        let noon = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 15).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        assert_eq!(
            ValueKind::Date.coerce(&noon.into()),
            Some(Value::from(midnight))
        );
        assert_eq!(
            ValueKind::Timestamp.coerce(&noon.into()),
            Some(Value::from(noon))
        );

        // Before the epoch still rounds down to the same day.
        let early = Utc.with_ymd_and_hms(1969, 12, 31, 23, 0, 0).unwrap();
        let day = Utc.with_ymd_and_hms(1969, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(ValueKind::Date.coerce(&early.into()), Some(Value::from(day)));
    }

    #[test]
    fn test_value_serialization() {
        let value = Value::String("Lorem ipsum".into());
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&value).unwrap();
        let archived = rkyv::access::<ArchivedValue, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Value =
            rkyv::deserialize::<Value, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(value, deserialized);
    }
}
