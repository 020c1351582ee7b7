//! RESULT body decoding and the row / result set model.
//!
//! Rows keep their cells as raw bytes; typed values are produced on demand
//! by applying the column's [`ColumnType`]. Every row of a result set shares
//! one [`Columns`] instance.

use crate::error::{AccessError, ProtocolError};
use crate::types::{ColumnType, FromValue, Value};
use crate::wire;
use bytes::Bytes;
use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// RESULT kinds.
pub mod kind {
    pub const VOID: i32 = 0x0001;
    pub const ROWS: i32 = 0x0002;
    pub const SET_KEYSPACE: i32 = 0x0003;
    pub const PREPARED: i32 = 0x0004;
    pub const SCHEMA_CHANGE: i32 = 0x0005;
}

/// Rows metadata flags.
pub mod rows_flags {
    pub const GLOBAL_TABLES_SPEC: i32 = 0x0001;
    pub const HAS_MORE_PAGES: i32 = 0x0002;
    pub const NO_METADATA: i32 = 0x0004;
}

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub position: usize,
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub ty: ColumnType,
}

/// Column metadata shared by every row of a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns(Arc<[ColumnSpec]>);

impl Columns {
    pub fn new(specs: Vec<ColumnSpec>) -> Self {
        Self(specs.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnSpec> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnSpec> {
        self.0.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c.name == name)
    }

    /// Returns whether both handles point at the same metadata.
    pub fn ptr_eq(&self, other: &Columns) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Columns {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Index<usize> for Columns {
    type Output = ColumnSpec;

    fn index(&self, index: usize) -> &ColumnSpec {
        &self.0[index]
    }
}

/// A way of addressing a column in a row: by name or by position.
pub trait ColumnRef {
    fn resolve(&self, columns: &Columns) -> Result<usize, AccessError>;
}

impl ColumnRef for &str {
    fn resolve(&self, columns: &Columns) -> Result<usize, AccessError> {
        columns
            .index_of(self)
            .ok_or_else(|| AccessError::NoSuchColumn((*self).to_string()))
    }
}

impl ColumnRef for String {
    fn resolve(&self, columns: &Columns) -> Result<usize, AccessError> {
        self.as_str().resolve(columns)
    }
}

impl ColumnRef for usize {
    fn resolve(&self, columns: &Columns) -> Result<usize, AccessError> {
        if *self < columns.len() {
            Ok(*self)
        } else {
            Err(AccessError::IndexOutOfRange {
                index: *self,
                len: columns.len(),
            })
        }
    }
}

/// One result row: raw cells plus shared column metadata.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Columns,
    cells: Vec<Option<Bytes>>,
}

impl Row {
    pub(crate) fn new(columns: Columns, cells: Vec<Option<Bytes>>) -> Self {
        debug_assert_eq!(columns.len(), cells.len());
        Self { columns, cells }
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the raw cell; `None` inside the result means a null cell.
    pub fn raw(&self, column: impl ColumnRef) -> Result<Option<&Bytes>, AccessError> {
        let index = column.resolve(&self.columns)?;
        Ok(self.cells[index].as_ref())
    }

    /// Decodes one cell. A null cell decodes to `None`, never to a zero value.
    pub fn decode(&self, column: impl ColumnRef) -> Result<Option<Value>, AccessError> {
        let index = column.resolve(&self.columns)?;
        self.decode_index(index)
    }

    fn decode_index(&self, index: usize) -> Result<Option<Value>, AccessError> {
        match &self.cells[index] {
            Some(raw) => Ok(Some(self.columns[index].ty.decode(raw)?)),
            None => Ok(None),
        }
    }

    /// Decodes one cell into a concrete type.
    ///
    /// Use `Option<T>` for nullable columns; a null cell read as plain `T`
    /// is a type mismatch.
    pub fn get<T: FromValue>(&self, column: impl ColumnRef) -> Result<T, AccessError> {
        let index = column.resolve(&self.columns)?;
        let value = self.decode_index(index)?;
        T::from_value(value).map_err(|found| AccessError::TypeMismatch {
            column: self.columns[index].name.clone(),
            expected: T::expected(),
            found,
        })
    }

    /// Decodes every cell, in column order.
    pub fn values(&self) -> Result<Vec<Option<Value>>, AccessError> {
        (0..self.cells.len()).map(|i| self.decode_index(i)).collect()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, spec) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.decode_index(i) {
                Ok(Some(value)) => write!(f, "{}={}", spec.name, value)?,
                Ok(None) => write!(f, "{}=null", spec.name)?,
                Err(_) => write!(f, "{}=<undecodable>", spec.name)?,
            }
        }
        Ok(())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (i, spec) in self.columns.iter().enumerate() {
            let value = self.decode_index(i).map_err(S::Error::custom)?;
            map.serialize_entry(&spec.name, &value)?;
        }
        map.end()
    }
}

/// Decoded rows plus their shared column metadata.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Columns,
    rows: Vec<Row>,
    paging_state: Option<Bytes>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Opaque cursor for the next page, when the server reported more.
    pub fn paging_state(&self) -> Option<&Bytes> {
        self.paging_state.as_ref()
    }

    /// Decodes a Rows result body (everything after the kind).
    pub fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let flags = wire::read_int(buf)?;
        let column_count = wire::read_int(buf)?;
        if column_count < 0 {
            return Err(ProtocolError::InvalidLength(column_count));
        }

        if flags & rows_flags::NO_METADATA != 0 {
            return Err(ProtocolError::UnsupportedMetadata(flags));
        }

        let paging_state = if flags & rows_flags::HAS_MORE_PAGES != 0 {
            wire::read_bytes(buf)?
        } else {
            None
        };

        let global_spec = if flags & rows_flags::GLOBAL_TABLES_SPEC != 0 {
            Some((wire::read_string(buf)?, wire::read_string(buf)?))
        } else {
            None
        };

        let mut specs = Vec::with_capacity((column_count as usize).min(buf.len()));
        for position in 0..column_count as usize {
            let (keyspace, table) = match &global_spec {
                Some((keyspace, table)) => (keyspace.clone(), table.clone()),
                None => (wire::read_string(buf)?, wire::read_string(buf)?),
            };
            let name = wire::read_string(buf)?;
            let ty = ColumnType::read(buf)?;
            specs.push(ColumnSpec {
                position,
                keyspace,
                table,
                name,
                ty,
            });
        }
        let columns = Columns::new(specs);

        let row_count = wire::read_int(buf)?;
        if row_count < 0 {
            return Err(ProtocolError::InvalidLength(row_count));
        }

        // Each cell carries at least its 4-byte length, so a row count the
        // remaining body cannot hold is rejected before allocating.
        let min_row_len = columns.len() * 4;
        if min_row_len == 0 {
            if row_count > 0 {
                return Err(ProtocolError::InvalidLength(row_count));
            }
        } else {
            let needed = (row_count as usize).saturating_mul(min_row_len);
            if needed > buf.len() {
                return Err(ProtocolError::truncated("rows", needed, buf.len()));
            }
        }

        let mut rows = Vec::with_capacity((row_count as usize).min(buf.len()));
        for _ in 0..row_count {
            let cells = (0..columns.len())
                .map(|_| wire::read_bytes(buf))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(Row::new(columns.clone(), cells));
        }

        Ok(Self {
            columns,
            rows,
            paging_state,
        })
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// A decoded RESULT frame.
#[derive(Debug, Clone)]
pub enum QueryResult {
    Void,
    Rows(ResultSet),
    /// The keyspace named by a `USE` statement.
    SetKeyspace(String),
    /// Prepared statement metadata is not decoded.
    Prepared,
    /// Schema change details are not decoded.
    SchemaChange,
}

impl QueryResult {
    /// Decodes a RESULT body.
    pub fn decode(mut body: Bytes) -> Result<Self, ProtocolError> {
        let kind = wire::read_int(&mut body)?;
        match kind {
            kind::VOID => Ok(QueryResult::Void),
            kind::ROWS => Ok(QueryResult::Rows(ResultSet::decode(&mut body)?)),
            kind::SET_KEYSPACE => Ok(QueryResult::SetKeyspace(wire::read_string(&mut body)?)),
            kind::PREPARED => Ok(QueryResult::Prepared),
            kind::SCHEMA_CHANGE => Ok(QueryResult::SchemaChange),
            other => Err(ProtocolError::UnknownResultKind(other)),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryResult::Void => "void",
            QueryResult::Rows(_) => "rows",
            QueryResult::SetKeyspace(_) => "set_keyspace",
            QueryResult::Prepared => "prepared",
            QueryResult::SchemaChange => "schema_change",
        }
    }

    /// Returns the rows, or an empty result set for non-row kinds.
    pub fn into_rows(self) -> ResultSet {
        match self {
            QueryResult::Rows(rows) => rows,
            _ => ResultSet::empty(),
        }
    }
}
