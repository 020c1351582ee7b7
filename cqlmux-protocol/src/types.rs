//! Column type registry and typed cell values.
//!
//! A [`ColumnType`] is read from result metadata (`[option]` notation: a
//! `[short]` type code, followed by nested options for collections) and
//! knows how to turn a raw, non-null cell into a [`Value`].
//!
//! Collection elements are not yet decoded: LIST, MAP and SET cells come
//! back as [`Value::Collection`] carrying the raw serialized bytes.

use crate::error::ProtocolError;
use crate::wire;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// Day number (since 0001-01-01) of the Unix epoch.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// DATE cells count days with the epoch at 2^31.
const DATE_EPOCH_OFFSET: i64 = 1 << 31;

const NANOS_PER_DAY: i64 = 86_400 * 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    Map,
    Set,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::List => write!(f, "list"),
            CollectionKind::Map => write!(f, "map"),
            CollectionKind::Set => write!(f, "set"),
        }
    }
}

/// Column type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Server-side custom type, identified by its class name.
    Custom(String),
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    TimeUuid,
    Inet,
    Date,
    Time,
    SmallInt,
    TinyInt,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
}

impl ColumnType {
    /// Reads a type option, recursing into collection element types.
    ///
    /// Codes this client cannot lay out (UDT, tuple, anything unknown) fail
    /// with [`ProtocolError::UnsupportedType`]: skipping them would leave the
    /// metadata cursor at an unknown position.
    pub fn read(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let code = wire::read_short(buf)?;
        let ty = match code {
            0x0000 => ColumnType::Custom(wire::read_string(buf)?),
            0x0001 => ColumnType::Ascii,
            0x0002 => ColumnType::BigInt,
            0x0003 => ColumnType::Blob,
            0x0004 => ColumnType::Boolean,
            0x0005 => ColumnType::Counter,
            0x0006 => ColumnType::Decimal,
            0x0007 => ColumnType::Double,
            0x0008 => ColumnType::Float,
            0x0009 => ColumnType::Int,
            0x000B => ColumnType::Timestamp,
            0x000C => ColumnType::Uuid,
            0x000D => ColumnType::Varchar,
            0x000E => ColumnType::Varint,
            0x000F => ColumnType::TimeUuid,
            0x0010 => ColumnType::Inet,
            0x0011 => ColumnType::Date,
            0x0012 => ColumnType::Time,
            0x0013 => ColumnType::SmallInt,
            0x0014 => ColumnType::TinyInt,
            0x0020 => ColumnType::List(Box::new(Self::read(buf)?)),
            0x0021 => {
                let key = Self::read(buf)?;
                let value = Self::read(buf)?;
                ColumnType::Map(Box::new(key), Box::new(value))
            }
            0x0022 => ColumnType::Set(Box::new(Self::read(buf)?)),
            other => return Err(ProtocolError::UnsupportedType(other)),
        };
        Ok(ty)
    }

    /// Returns the wire type code.
    pub fn code(&self) -> u16 {
        match self {
            ColumnType::Custom(_) => 0x0000,
            ColumnType::Ascii => 0x0001,
            ColumnType::BigInt => 0x0002,
            ColumnType::Blob => 0x0003,
            ColumnType::Boolean => 0x0004,
            ColumnType::Counter => 0x0005,
            ColumnType::Decimal => 0x0006,
            ColumnType::Double => 0x0007,
            ColumnType::Float => 0x0008,
            ColumnType::Int => 0x0009,
            ColumnType::Timestamp => 0x000B,
            ColumnType::Uuid => 0x000C,
            ColumnType::Varchar => 0x000D,
            ColumnType::Varint => 0x000E,
            ColumnType::TimeUuid => 0x000F,
            ColumnType::Inet => 0x0010,
            ColumnType::Date => 0x0011,
            ColumnType::Time => 0x0012,
            ColumnType::SmallInt => 0x0013,
            ColumnType::TinyInt => 0x0014,
            ColumnType::List(_) => 0x0020,
            ColumnType::Map(_, _) => 0x0021,
            ColumnType::Set(_) => 0x0022,
        }
    }

    /// Decodes a non-null cell. Pure: the same bytes always produce an
    /// equal value.
    pub fn decode(&self, raw: &Bytes) -> Result<Value, ProtocolError> {
        let value = match self {
            ColumnType::Custom(_) => Value::Custom(raw.clone()),
            ColumnType::Ascii => {
                if !raw.is_ascii() {
                    return Err(ProtocolError::invalid_cell("ascii", "non-ASCII byte"));
                }
                Value::Ascii(utf8(raw, "ascii")?)
            }
            ColumnType::Varchar => Value::Text(utf8(raw, "varchar")?),
            ColumnType::BigInt => Value::BigInt(i64::from_be_bytes(fixed(raw, "bigint")?)),
            ColumnType::Counter => Value::Counter(i64::from_be_bytes(fixed(raw, "counter")?)),
            ColumnType::Int => Value::Int(i32::from_be_bytes(fixed(raw, "int")?)),
            ColumnType::SmallInt => Value::SmallInt(i16::from_be_bytes(fixed(raw, "smallint")?)),
            ColumnType::TinyInt => Value::TinyInt(i8::from_be_bytes(fixed(raw, "tinyint")?)),
            ColumnType::Boolean => {
                let [byte] = fixed(raw, "boolean")?;
                Value::Boolean(byte != 0)
            }
            ColumnType::Double => Value::Double(f64::from_be_bytes(fixed(raw, "double")?)),
            ColumnType::Float => Value::Float(f32::from_be_bytes(fixed(raw, "float")?)),
            ColumnType::Blob => Value::Blob(raw.clone()),
            ColumnType::Decimal => Value::Decimal(raw.clone()),
            ColumnType::Varint => Value::Varint(raw.clone()),
            ColumnType::Timestamp => {
                let millis = i64::from_be_bytes(fixed(raw, "timestamp")?);
                let ts = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                    ProtocolError::invalid_cell("timestamp", format!("{} out of range", millis))
                })?;
                Value::Timestamp(ts)
            }
            ColumnType::Uuid => Value::Uuid(Uuid::from_bytes(fixed(raw, "uuid")?)),
            ColumnType::TimeUuid => Value::TimeUuid(Uuid::from_bytes(fixed(raw, "timeuuid")?)),
            ColumnType::Inet => Value::Inet(wire::ip_from_slice(raw)?),
            ColumnType::Date => {
                let days = u32::from_be_bytes(fixed(raw, "date")?) as i64 - DATE_EPOCH_OFFSET;
                let date = i32::try_from(EPOCH_DAYS_FROM_CE + days)
                    .ok()
                    .and_then(NaiveDate::from_num_days_from_ce_opt)
                    .ok_or_else(|| {
                        ProtocolError::invalid_cell("date", format!("{} days out of range", days))
                    })?;
                Value::Date(date)
            }
            ColumnType::Time => {
                let nanos = i64::from_be_bytes(fixed(raw, "time")?);
                if !(0..NANOS_PER_DAY).contains(&nanos) {
                    return Err(ProtocolError::invalid_cell(
                        "time",
                        format!("{} nanoseconds is not a time of day", nanos),
                    ));
                }
                Value::Time(nanos)
            }
            ColumnType::List(_) => Value::Collection {
                kind: CollectionKind::List,
                raw: raw.clone(),
            },
            ColumnType::Map(_, _) => Value::Collection {
                kind: CollectionKind::Map,
                raw: raw.clone(),
            },
            ColumnType::Set(_) => Value::Collection {
                kind: CollectionKind::Set,
                raw: raw.clone(),
            },
        };
        Ok(value)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Custom(class) => write!(f, "'{}'", class),
            ColumnType::Ascii => write!(f, "ascii"),
            ColumnType::BigInt => write!(f, "bigint"),
            ColumnType::Blob => write!(f, "blob"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Counter => write!(f, "counter"),
            ColumnType::Decimal => write!(f, "decimal"),
            ColumnType::Double => write!(f, "double"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Int => write!(f, "int"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Uuid => write!(f, "uuid"),
            ColumnType::Varchar => write!(f, "text"),
            ColumnType::Varint => write!(f, "varint"),
            ColumnType::TimeUuid => write!(f, "timeuuid"),
            ColumnType::Inet => write!(f, "inet"),
            ColumnType::Date => write!(f, "date"),
            ColumnType::Time => write!(f, "time"),
            ColumnType::SmallInt => write!(f, "smallint"),
            ColumnType::TinyInt => write!(f, "tinyint"),
            ColumnType::List(elem) => write!(f, "list<{}>", elem),
            ColumnType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
            ColumnType::Set(elem) => write!(f, "set<{}>", elem),
        }
    }
}

fn fixed<const N: usize>(raw: &[u8], kind: &'static str) -> Result<[u8; N], ProtocolError> {
    raw.try_into().map_err(|_| {
        ProtocolError::invalid_cell(kind, format!("expected {} bytes, got {}", N, raw.len()))
    })
}

fn utf8(raw: &[u8], kind: &'static str) -> Result<String, ProtocolError> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidUtf8(kind))
}

/// A decoded, non-null cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Ascii(String),
    Text(String),
    BigInt(i64),
    Counter(i64),
    Int(i32),
    SmallInt(i16),
    TinyInt(i8),
    Boolean(bool),
    Double(f64),
    Float(f32),
    Blob(Bytes),
    Custom(Bytes),
    /// Arbitrary-precision decimal, left in its serialized form.
    Decimal(Bytes),
    /// Arbitrary-precision integer, left in its serialized form.
    Varint(Bytes),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    TimeUuid(Uuid),
    Inet(IpAddr),
    Date(NaiveDate),
    /// Nanoseconds since midnight.
    Time(i64),
    /// LIST / MAP / SET cell; elements not yet decoded.
    Collection { kind: CollectionKind, raw: Bytes },
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Ascii(_) => "ascii",
            Value::Text(_) => "text",
            Value::BigInt(_) => "bigint",
            Value::Counter(_) => "counter",
            Value::Int(_) => "int",
            Value::SmallInt(_) => "smallint",
            Value::TinyInt(_) => "tinyint",
            Value::Boolean(_) => "boolean",
            Value::Double(_) => "double",
            Value::Float(_) => "float",
            Value::Blob(_) => "blob",
            Value::Custom(_) => "custom",
            Value::Decimal(_) => "decimal",
            Value::Varint(_) => "varint",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::TimeUuid(_) => "timeuuid",
            Value::Inet(_) => "inet",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Collection { kind, .. } => match kind {
                CollectionKind::List => "list",
                CollectionKind::Map => "map",
                CollectionKind::Set => "set",
            },
        }
    }
}

fn hex_string(raw: &[u8]) -> String {
    let mut out = String::with_capacity(2 + raw.len() * 2);
    out.push_str("0x");
    for byte in raw {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ascii(s) | Value::Text(s) => write!(f, "{}", s),
            Value::BigInt(n) | Value::Counter(n) | Value::Time(n) => write!(f, "{}", n),
            Value::Int(n) => write!(f, "{}", n),
            Value::SmallInt(n) => write!(f, "{}", n),
            Value::TinyInt(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Double(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Blob(raw) | Value::Custom(raw) | Value::Decimal(raw) | Value::Varint(raw) => {
                write!(f, "{}", hex_string(raw))
            }
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Uuid(id) | Value::TimeUuid(id) => write!(f, "{}", id),
            Value::Inet(addr) => write!(f, "{}", addr),
            Value::Date(date) => write!(f, "{}", date),
            Value::Collection { kind, raw } => write!(f, "<{} {}>", kind, hex_string(raw)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Ascii(s) | Value::Text(s) => serializer.serialize_str(s),
            Value::BigInt(n) | Value::Counter(n) | Value::Time(n) => serializer.serialize_i64(*n),
            Value::Int(n) => serializer.serialize_i32(*n),
            Value::SmallInt(n) => serializer.serialize_i16(*n),
            Value::TinyInt(n) => serializer.serialize_i8(*n),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Double(n) => serializer.serialize_f64(*n),
            Value::Float(n) => serializer.serialize_f32(*n),
            other => serializer.collect_str(other),
        }
    }
}

/// Conversion from a decoded cell into a concrete Rust type.
///
/// `from_value` receives `None` for a null cell and returns the found type
/// name on mismatch.
pub trait FromValue: Sized {
    fn expected() -> &'static str;

    fn from_value(value: Option<Value>) -> Result<Self, &'static str>;
}

macro_rules! impl_from_value {
    ($ty:ty, $expected:literal, $($variant:ident)|+) => {
        impl FromValue for $ty {
            fn expected() -> &'static str {
                $expected
            }

            fn from_value(value: Option<Value>) -> Result<Self, &'static str> {
                match value {
                    $(Some(Value::$variant(v)) => Ok(v),)+
                    Some(other) => Err(other.type_name()),
                    None => Err("null"),
                }
            }
        }
    };
}

impl_from_value!(String, "text", Text | Ascii);
impl_from_value!(i64, "bigint", BigInt | Counter);
impl_from_value!(i32, "int", Int);
impl_from_value!(i16, "smallint", SmallInt);
impl_from_value!(i8, "tinyint", TinyInt);
impl_from_value!(bool, "boolean", Boolean);
impl_from_value!(f64, "double", Double);
impl_from_value!(f32, "float", Float);
impl_from_value!(Bytes, "blob", Blob | Custom);
impl_from_value!(Uuid, "uuid", Uuid | TimeUuid);
impl_from_value!(DateTime<Utc>, "timestamp", Timestamp);
impl_from_value!(NaiveDate, "date", Date);
impl_from_value!(IpAddr, "inet", Inet);

impl FromValue for Value {
    fn expected() -> &'static str {
        "any"
    }

    fn from_value(value: Option<Value>) -> Result<Self, &'static str> {
        value.ok_or("null")
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn expected() -> &'static str {
        T::expected()
    }

    fn from_value(value: Option<Value>) -> Result<Self, &'static str> {
        match value {
            None => Ok(None),
            some => T::from_value(some).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    fn read_type(raw: &[u8]) -> Result<ColumnType, ProtocolError> {
        let mut buf = Bytes::copy_from_slice(raw);
        ColumnType::read(&mut buf)
    }

    #[test]
    fn test_read_scalar_types() {
        assert_eq!(read_type(&[0x00, 0x09]).unwrap(), ColumnType::Int);
        assert_eq!(read_type(&[0x00, 0x0D]).unwrap(), ColumnType::Varchar);
        assert_eq!(read_type(&[0x00, 0x0B]).unwrap(), ColumnType::Timestamp);
        assert_eq!(read_type(&[0x00, 0x14]).unwrap(), ColumnType::TinyInt);
    }

    #[test]
    fn test_read_custom_type() {
        let mut out = BytesMut::new();
        out.put_u16(0x0000);
        wire::write_string(&mut out, "org.example.Point");
        let ty = read_type(&out).unwrap();
        assert_eq!(ty, ColumnType::Custom("org.example.Point".to_string()));
        assert_eq!(ty.code(), 0);
    }

    #[test]
    fn test_read_nested_collections() {
        // map<text, list<int>>
        let ty = read_type(&[0x00, 0x21, 0x00, 0x0D, 0x00, 0x20, 0x00, 0x09]).unwrap();
        assert_eq!(
            ty,
            ColumnType::Map(
                Box::new(ColumnType::Varchar),
                Box::new(ColumnType::List(Box::new(ColumnType::Int)))
            )
        );
        assert_eq!(ty.to_string(), "map<text, list<int>>");

        let ty = read_type(&[0x00, 0x22, 0x00, 0x0C]).unwrap();
        assert_eq!(ty, ColumnType::Set(Box::new(ColumnType::Uuid)));
    }

    #[test]
    fn test_read_consumes_exactly_one_option() {
        let mut buf = Bytes::from_static(&[0x00, 0x20, 0x00, 0x02, 0xAA]);
        ColumnType::read(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0xAA]);
    }

    #[test]
    fn test_unsupported_type_fails_fast() {
        assert!(matches!(
            read_type(&[0x00, 0x30]),
            Err(ProtocolError::UnsupportedType(0x30))
        ));
        assert!(matches!(
            read_type(&[0x00, 0x31]),
            Err(ProtocolError::UnsupportedType(0x31))
        ));
        // Nested unknown code inside a list
        assert!(matches!(
            read_type(&[0x00, 0x20, 0x00, 0x0A]),
            Err(ProtocolError::UnsupportedType(0x0A))
        ));
        assert!(matches!(
            read_type(&[0x00]),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_integers() {
        let int = ColumnType::Int
            .decode(&Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFE]))
            .unwrap();
        assert_eq!(int, Value::Int(-2));

        let big = ColumnType::BigInt
            .decode(&Bytes::copy_from_slice(&42i64.to_be_bytes()))
            .unwrap();
        assert_eq!(big, Value::BigInt(42));

        let small = ColumnType::SmallInt
            .decode(&Bytes::from_static(&[0x01, 0x00]))
            .unwrap();
        assert_eq!(small, Value::SmallInt(256));

        let tiny = ColumnType::TinyInt.decode(&Bytes::from_static(&[0x80])).unwrap();
        assert_eq!(tiny, Value::TinyInt(-128));
    }

    #[test]
    fn test_decode_wrong_width_fails() {
        let result = ColumnType::Int.decode(&Bytes::from_static(&[0x00, 0x01, 0x02]));
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidCell { kind: "int", .. })
        ));

        let result = ColumnType::Uuid.decode(&Bytes::from_static(&[0u8; 15]));
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_text() {
        let text = ColumnType::Varchar
            .decode(&Bytes::from_static("héllo".as_bytes()))
            .unwrap();
        assert_eq!(text, Value::Text("héllo".to_string()));

        let empty = ColumnType::Varchar.decode(&Bytes::new()).unwrap();
        assert_eq!(empty, Value::Text(String::new()));

        assert!(ColumnType::Ascii
            .decode(&Bytes::from_static("héllo".as_bytes()))
            .is_err());
        assert!(matches!(
            ColumnType::Varchar.decode(&Bytes::from_static(&[0xC3])),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_decode_floats_and_bool() {
        let d = ColumnType::Double
            .decode(&Bytes::copy_from_slice(&1.5f64.to_be_bytes()))
            .unwrap();
        assert_eq!(d, Value::Double(1.5));

        let f = ColumnType::Float
            .decode(&Bytes::copy_from_slice(&0.25f32.to_be_bytes()))
            .unwrap();
        assert_eq!(f, Value::Float(0.25));

        assert_eq!(
            ColumnType::Boolean.decode(&Bytes::from_static(&[1])).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            ColumnType::Boolean.decode(&Bytes::from_static(&[0])).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_decode_timestamp_date_time() {
        let ts = ColumnType::Timestamp
            .decode(&Bytes::copy_from_slice(&1_700_000_000_000i64.to_be_bytes()))
            .unwrap();
        assert_eq!(ts.to_string(), "2023-11-14T22:13:20+00:00");

        let epoch = ColumnType::Date
            .decode(&Bytes::copy_from_slice(&(1u32 << 31).to_be_bytes()))
            .unwrap();
        assert_eq!(epoch, Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()));

        let before = ColumnType::Date
            .decode(&Bytes::copy_from_slice(&((1u32 << 31) - 1).to_be_bytes()))
            .unwrap();
        assert_eq!(before, Value::Date(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()));

        let noon = 12 * 3600 * 1_000_000_000i64;
        assert_eq!(
            ColumnType::Time
                .decode(&Bytes::copy_from_slice(&noon.to_be_bytes()))
                .unwrap(),
            Value::Time(noon)
        );
        assert!(ColumnType::Time
            .decode(&Bytes::copy_from_slice(&NANOS_PER_DAY.to_be_bytes()))
            .is_err());
    }

    #[test]
    fn test_decode_uuid_and_inet() {
        let id = Uuid::new_v4();
        let value = ColumnType::Uuid
            .decode(&Bytes::copy_from_slice(id.as_bytes()))
            .unwrap();
        assert_eq!(value, Value::Uuid(id));

        let addr = ColumnType::Inet
            .decode(&Bytes::from_static(&[127, 0, 0, 1]))
            .unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_opaque_passthrough() {
        let raw = Bytes::from_static(&[0xDE, 0xAD]);
        assert_eq!(
            ColumnType::Blob.decode(&raw).unwrap(),
            Value::Blob(raw.clone())
        );
        assert_eq!(
            ColumnType::Varint.decode(&raw).unwrap(),
            Value::Varint(raw.clone())
        );
        assert_eq!(ColumnType::Blob.decode(&raw).unwrap().to_string(), "0xdead");
    }

    #[test]
    fn test_collections_not_yet_decoded() {
        let raw = Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0, 0, 0, 7]);
        let ty = ColumnType::List(Box::new(ColumnType::Int));
        let value = ty.decode(&raw).unwrap();
        assert_eq!(
            value,
            Value::Collection {
                kind: CollectionKind::List,
                raw: raw.clone(),
            }
        );
        assert_eq!(value.type_name(), "list");
    }

    #[test]
    fn test_decode_is_repeatable() {
        let raw = Bytes::from_static(b"stable");
        let first = ColumnType::Varchar.decode(&raw).unwrap();
        let second = ColumnType::Varchar.decode(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_value() {
        assert_eq!(
            String::from_value(Some(Value::Text("a".into()))),
            Ok("a".to_string())
        );
        assert_eq!(i64::from_value(Some(Value::Counter(3))), Ok(3));
        assert_eq!(i32::from_value(Some(Value::Text("a".into()))), Err("text"));
        assert_eq!(i32::from_value(None), Err("null"));
        assert_eq!(Option::<i32>::from_value(None), Ok(None));
        assert_eq!(Option::<i32>::from_value(Some(Value::Int(5))), Ok(Some(5)));
        assert_eq!(Option::<i32>::from_value(Some(Value::Boolean(true))), Err("boolean"));
    }

    #[test]
    fn test_value_serialize() {
        let json = serde_json::to_string(&Value::Int(7)).unwrap();
        assert_eq!(json, "7");

        let json = serde_json::to_string(&Value::Text("x".into())).unwrap();
        assert_eq!(json, "\"x\"");

        let json = serde_json::to_string(&Value::Blob(Bytes::from_static(&[1, 2]))).unwrap();
        assert_eq!(json, "\"0x0102\"");
    }
}
