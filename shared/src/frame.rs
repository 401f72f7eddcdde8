//! Tabular frame backed by a polars `DataFrame`
//!
//! Every source file (monitoring, weather, soil, yield history) is loaded
//! into a `Frame`, and the fusion pipeline produces a new one at each stage.
//! Columns are typed on construction: all-number columns become `Float64`,
//! all-timestamp columns `Datetime(ms)`, anything else `String`.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::{
    AnyValue, Column, DataFrame, DataType, DatetimeChunked, IntoSeries, NamedFrom, PolarsError,
    Series, SortMultipleOptions, TimeUnit,
};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Unit used for every timestamp column built here
pub const TIMESTAMP_UNIT: TimeUnit = TimeUnit::Milliseconds;

/// Polars type of a timestamp column
pub fn timestamp_dtype() -> DataType {
    DataType::Datetime(TIMESTAMP_UNIT, None)
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    /// Render the cell the way it is written back to CSV
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Number(value) => value.to_string(),
            Cell::Text(value) => value.clone(),
            Cell::Timestamp(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    fn from_any_value(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Cell::Null,
            AnyValue::Float64(v) => Cell::Number(v),
            AnyValue::Float32(v) => Cell::Number(f64::from(v)),
            AnyValue::Int64(v) => Cell::Number(v as f64),
            AnyValue::Int32(v) => Cell::Number(f64::from(v)),
            AnyValue::UInt64(v) => Cell::Number(v as f64),
            AnyValue::UInt32(v) => Cell::Number(f64::from(v)),
            AnyValue::String(v) => Cell::Text(v.to_string()),
            AnyValue::StringOwned(v) => Cell::Text(v.to_string()),
            AnyValue::Datetime(v, unit, _) => naive_from_epoch(v, unit)
                .map(Cell::Timestamp)
                .unwrap_or(Cell::Null),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Null)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Timestamp(value)
    }
}

fn naive_from_epoch(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let instant = match unit {
        TimeUnit::Milliseconds => DateTime::<Utc>::from_timestamp_millis(value)?,
        TimeUnit::Microseconds => DateTime::<Utc>::from_timestamp_micros(value)?,
        TimeUnit::Nanoseconds => DateTime::<Utc>::from_timestamp_nanos(value),
    };
    Some(instant.naive_utc())
}

/// Schema problems detected while reading or joining frames
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("column '{column}' is missing from table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("row {row} of table '{table}' has {found} cells, expected {expected}")]
    RaggedRow {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("table '{table}': {message}")]
    Engine { table: String, message: String },
}

impl SchemaError {
    /// Wrap a polars failure, naming the table it happened on
    pub fn engine(table: &str, cause: PolarsError) -> Self {
        SchemaError::Engine {
            table: table.to_string(),
            message: cause.to_string(),
        }
    }
}

/// A named table with ordered, typed columns
#[derive(Debug, Clone)]
pub struct Frame {
    name: String,
    data: DataFrame,
}

impl Frame {
    /// Build a frame from named columns of cells. Every column must have the
    /// same length.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(String, Vec<Cell>)>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let columns: Vec<Column> = columns
            .iter()
            .map(|(column, cells)| column_from_cells(column, cells))
            .collect();
        let data = DataFrame::new(columns).map_err(|e| SchemaError::engine(&name, e))?;
        Ok(Self { name, data })
    }

    /// Build a frame from rows, rejecting rows whose width differs from the header
    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let mut values: Vec<Vec<Cell>> = vec![Vec::with_capacity(rows.len()); columns.len()];
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SchemaError::RaggedRow {
                    table: name,
                    row: index,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            for (column, cell) in values.iter_mut().zip(row) {
                column.push(cell);
            }
        }
        Self::from_columns(name, columns.into_iter().zip(values).collect())
    }

    pub fn from_data_frame(name: impl Into<String>, data: DataFrame) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn data_frame(&self) -> &DataFrame {
        &self.data
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> Vec<String> {
        self.data
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.height()
    }

    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.data.get_column_index(column).is_some()
    }

    pub fn require_column(&self, column: &str) -> Result<(), SchemaError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(SchemaError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
        }
    }

    /// Cell at (row, column name); `None` when either is out of range
    pub fn get(&self, row: usize, column: &str) -> Option<Cell> {
        let column = self.data.column(column).ok()?;
        if row >= column.len() {
            return None;
        }
        column.get(row).ok().map(Cell::from_any_value)
    }

    /// Finite number at (row, column)
    pub fn number(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column).and_then(|cell| cell.as_f64())
    }

    /// Text at (row, column); numbers and timestamps are not text
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        match self.get(row, column)? {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn timestamp(&self, row: usize, column: &str) -> Option<NaiveDateTime> {
        self.get(row, column).and_then(|cell| cell.as_timestamp())
    }

    /// All cells of one column, top to bottom
    pub fn column(&self, column: &str) -> Option<Vec<Cell>> {
        let column = self.data.column(column).ok()?;
        Some(column_cells(column))
    }

    /// All rows, materialized as cells in column order
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        let columns: Vec<Vec<Cell>> = self.data.get_columns().iter().map(column_cells).collect();
        (0..self.len())
            .map(|row| columns.iter().map(|cells| cells[row].clone()).collect())
            .collect()
    }

    /// Return a new frame with `column` set to `values`, replacing an existing
    /// column of the same name or appending it at the end.
    pub fn with_column(&self, column: &str, values: Vec<Cell>) -> Result<Self, SchemaError> {
        if values.len() != self.len() {
            return Err(SchemaError::RaggedRow {
                table: self.name.clone(),
                row: values.len(),
                expected: self.len(),
                found: values.len(),
            });
        }

        let mut data = self.data.clone();
        data.with_column(column_from_cells(column, &values))
            .map_err(|e| SchemaError::engine(&self.name, e))?;
        Ok(Self {
            name: self.name.clone(),
            data,
        })
    }

    /// Rename the frame, keeping its contents
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stable sort by a timestamp column, ascending. Rows without a
    /// timestamp keep their relative order and go last.
    pub fn sort_by_timestamp(&self, column: &str) -> Result<Self, SchemaError> {
        self.require_column(column)?;
        let data = self
            .data
            .sort(
                [column],
                SortMultipleOptions::default()
                    .with_nulls_last(true)
                    .with_maintain_order(true),
            )
            .map_err(|e| SchemaError::engine(&self.name, e))?;
        Ok(Self {
            name: self.name.clone(),
            data,
        })
    }

    /// Whether the rows are already in `sort_by_timestamp` order
    pub fn is_sorted_by_timestamp(&self, column: &str) -> bool {
        let Some(cells) = self.column(column) else {
            return false;
        };
        cells.windows(2).all(|pair| {
            compare_timestamps(pair[0].as_timestamp(), pair[1].as_timestamp()) != Ordering::Greater
        })
    }

    /// Serializable view of the rows as column-name keyed records
    pub fn records(&self) -> Records<'_> {
        Records { frame: self }
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.columns() == other.columns()
            && self.data.equals_missing(&other.data)
    }
}

/// Typed polars column for a list of cells
fn column_from_cells(name: &str, cells: &[Cell]) -> Column {
    let present = || cells.iter().filter(|cell| !cell.is_null());

    let series = if present().next().is_none() {
        Series::full_null(name.into(), cells.len(), &DataType::Null)
    } else if present().all(|cell| matches!(cell, Cell::Number(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Number(value) => Some(*value),
                _ => None,
            })
            .collect();
        Series::new(name.into(), values)
    } else if present().all(|cell| matches!(cell, Cell::Timestamp(_))) {
        DatetimeChunked::from_naive_datetime_options(
            name.into(),
            cells.iter().map(Cell::as_timestamp),
            TIMESTAMP_UNIT,
        )
        .into_series()
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|cell| (!cell.is_null()).then(|| cell.render()))
            .collect();
        Series::new(name.into(), values)
    };

    Column::from(series)
}

fn column_cells(column: &Column) -> Vec<Cell> {
    (0..column.len())
        .map(|row| {
            column
                .get(row)
                .map(Cell::from_any_value)
                .unwrap_or(Cell::Null)
        })
        .collect()
}

fn compare_timestamps(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Rows of a frame serialized as a list of objects, columns in frame order
pub struct Records<'a> {
    frame: &'a Frame,
}

struct Record<'a> {
    columns: &'a [String],
    cells: &'a [Cell],
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let columns = self.frame.columns();
        let rows = self.frame.rows();
        let mut seq = serializer.serialize_seq(Some(rows.len()))?;
        for cells in &rows {
            seq.serialize_element(&Record {
                columns: &columns,
                cells,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}
