//! Source loading and temporal indexing
//!
//! `Dataset::load` reads the four CSV sources into frames. Every later stage
//! takes a `&Dataset` and returns a new value; a dataset is never modified
//! after it is loaded.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::{CsvReadOptions, SerReader};
use serde::Deserialize;
use shared::{Cell, Frame, Schema, SourceKind};

use crate::error::{AppError, AppResult, FusionStage};

/// Cell contents treated as missing values
const NULL_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

/// Locations of the four source files
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DataSources {
    pub monitoring: PathBuf,
    pub weather: PathBuf,
    pub soil: PathBuf,
    pub yield_history: PathBuf,
}

impl DataSources {
    pub fn path(&self, source: SourceKind) -> &Path {
        match source {
            SourceKind::Monitoring => &self.monitoring,
            SourceKind::Weather => &self.weather,
            SourceKind::Soil => &self.soil,
            SourceKind::YieldHistory => &self.yield_history,
        }
    }
}

/// The four loaded tables. Frames are only reachable through accessors, so
/// an indexed dataset stays sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Schema,
    monitoring: Frame,
    weather: Frame,
    soil: Frame,
    yield_history: Frame,
    indexed: bool,
}

impl Dataset {
    /// Load all four sources. Fails without reading anything when one of
    /// the files does not exist.
    pub fn load(sources: &DataSources, schema: &Schema) -> AppResult<Self> {
        for source in SourceKind::ALL {
            let path = sources.path(source);
            if !path.exists() {
                return Err(AppError::MissingSource {
                    input: source,
                    path: path.to_path_buf(),
                });
            }
        }

        let monitoring = read_frame(SourceKind::Monitoring, &sources.monitoring, schema)?;
        let weather = read_frame(SourceKind::Weather, &sources.weather, schema)?;
        let soil = read_frame(SourceKind::Soil, &sources.soil, schema)?;
        let yield_history = read_frame(SourceKind::YieldHistory, &sources.yield_history, schema)?;

        let dataset = Self::from_frames(schema.clone(), monitoring, weather, soil, yield_history)?;
        dataset.log_validation_summary();

        tracing::info!(
            "Data loaded: {} monitoring, {} weather, {} soil, {} yield rows",
            dataset.monitoring.len(),
            dataset.weather.len(),
            dataset.soil.len(),
            dataset.yield_history.len()
        );

        Ok(dataset)
    }

    /// Assemble a dataset from frames already in memory. The yield table
    /// gets a timestamp column derived from its year column when it has none.
    pub fn from_frames(
        schema: Schema,
        monitoring: Frame,
        weather: Frame,
        soil: Frame,
        yield_history: Frame,
    ) -> AppResult<Self> {
        let yield_history = derive_yield_timestamps(yield_history, &schema)?;
        Ok(Self {
            schema,
            monitoring: monitoring.renamed(SourceKind::Monitoring.table_name()),
            weather: weather.renamed(SourceKind::Weather.table_name()),
            soil: soil.renamed(SourceKind::Soil.table_name()),
            yield_history: yield_history.renamed(SourceKind::YieldHistory.table_name()),
            indexed: false,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn monitoring(&self) -> &Frame {
        &self.monitoring
    }

    pub fn weather(&self) -> &Frame {
        &self.weather
    }

    pub fn soil(&self) -> &Frame {
        &self.soil
    }

    pub fn yield_history(&self) -> &Frame {
        &self.yield_history
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Re-key monitoring and weather by timestamp, ascending. Calling this on
    /// an indexed dataset returns an equal dataset.
    pub fn index_by_time(&self) -> AppResult<Self> {
        if self.indexed {
            return Ok(self.clone());
        }

        let column = &self.schema.timestamp;
        let monitoring = self
            .monitoring
            .sort_by_timestamp(column)
            .map_err(|e| AppError::fusion(FusionStage::TemporalIndex, e))?;
        let weather = self
            .weather
            .sort_by_timestamp(column)
            .map_err(|e| AppError::fusion(FusionStage::TemporalIndex, e))?;

        tracing::debug!("Temporal indices configured on '{}'", column);

        Ok(Self {
            schema: self.schema.clone(),
            monitoring,
            weather,
            soil: self.soil.clone(),
            yield_history: self.yield_history.clone(),
            indexed: true,
        })
    }

    fn log_validation_summary(&self) {
        let schema = &self.schema;

        let invalid_ndvi = count_invalid(&self.monitoring, &schema.ndvi, |v| {
            shared::validate_ndvi(v).is_ok()
        });
        let inverted_bands = (0..self.monitoring.len())
            .filter(|row| {
                let lower = self.monitoring.number(*row, &schema.lower_threshold);
                let upper = self.monitoring.number(*row, &schema.upper_threshold);
                matches!((lower, upper), (Some(l), Some(u)) if shared::validate_thresholds(l, u).is_err())
            })
            .count();
        let invalid_yields = count_invalid(&self.yield_history, &schema.yield_value, |v| {
            shared::validate_yield(v).is_ok()
        });
        let invalid_years = self
            .yield_history
            .column(&schema.year)
            .map(|cells| {
                cells
                    .iter()
                    .filter_map(cell_year)
                    .filter(|year| shared::validate_year(*year).is_err())
                    .count()
            })
            .unwrap_or(0);
        let empty_parcels: usize = [&self.monitoring, &self.soil, &self.yield_history]
            .iter()
            .filter_map(|frame| frame.column(&schema.parcel_id))
            .flatten()
            .filter(|cell| {
                cell.as_str()
                    .map_or(true, |id| shared::validate_parcel_id(id).is_err())
            })
            .count();

        if invalid_ndvi + inverted_bands + invalid_yields + invalid_years + empty_parcels > 0 {
            tracing::warn!(
                "Suspicious values kept as-is: {} NDVI out of range, {} inverted threshold bands, \
                 {} negative yields, {} implausible years, {} empty parcel ids",
                invalid_ndvi,
                inverted_bands,
                invalid_yields,
                invalid_years,
                empty_parcels
            );
        }
    }
}

fn count_invalid(frame: &Frame, column: &str, is_valid: impl Fn(f64) -> bool) -> usize {
    frame
        .column(column)
        .map(|cells| {
            cells
                .iter()
                .filter_map(Cell::as_f64)
                .filter(|v| !is_valid(*v))
                .count()
        })
        .unwrap_or(0)
}

/// Read one CSV source. Every field is read as text first; then parcel ids
/// stay text, the timestamp column is parsed into timestamps, and columns
/// whose values all look numeric become numbers.
fn read_frame(source: SourceKind, path: &Path, schema: &Schema) -> AppResult<Frame> {
    let csv_error = |cause| AppError::Csv {
        input: source,
        cause,
    };

    let raw = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(csv_error)?;

    let mut columns = Vec::with_capacity(raw.width());
    let mut unparsed_timestamps = 0usize;

    for column in raw.get_columns() {
        let name = column
            .name()
            .trim_start_matches('\u{feff}')
            .trim()
            .to_string();
        let values = column.as_materialized_series().str().map_err(csv_error)?;

        let cells: Vec<Cell> = if name == schema.parcel_id {
            values.into_iter().map(|raw| parse_text(raw.unwrap_or(""))).collect()
        } else if name == schema.timestamp {
            values
                .into_iter()
                .map(|raw| {
                    let raw = raw.unwrap_or("");
                    let cell = parse_timestamp(raw).map(Cell::Timestamp).unwrap_or(Cell::Null);
                    if cell.is_null() && !is_null_token(raw) {
                        unparsed_timestamps += 1;
                    }
                    cell
                })
                .collect()
        } else {
            values.into_iter().map(|raw| parse_cell(raw.unwrap_or(""))).collect()
        };
        columns.push((name, cells));
    }

    let frame = Frame::from_columns(source.table_name(), columns)
        .map_err(|e| AppError::fusion(FusionStage::TemporalIndex, e))?;

    if unparsed_timestamps > 0 {
        tracing::warn!(
            "{}: {} value(s) in '{}' could not be parsed as dates and were left empty",
            source,
            unparsed_timestamps,
            schema.timestamp
        );
    }
    tracing::debug!("{} source read from {}: {} rows", source, path.display(), frame.len());

    Ok(frame)
}

fn is_null_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

fn parse_text(raw: &str) -> Cell {
    if raw.trim().is_empty() {
        Cell::Null
    } else {
        Cell::Text(raw.trim().to_string())
    }
}

/// Parse a raw CSV value into a number, text, or null
pub fn parse_cell(raw: &str) -> Cell {
    if is_null_token(raw) {
        return Cell::Null;
    }
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Cell::Number(value),
        _ => Cell::Text(trimmed.to_string()),
    }
}

/// Parse the date formats found in monitoring exports. A bare four-digit
/// year means January 1st of that year. Offsets are dropped: every value is
/// read as local wall-clock time, whether or not it carries one.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok().and_then(year_start);
    }
    None
}

/// Midnight on January 1st of `year`
pub fn year_start(year: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)
}

/// Parcel ids are compared as text; a numeric cell is rendered first
pub fn parcel_key(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Null => None,
        Cell::Text(id) => Some(id.clone()),
        other => Some(other.render()),
    }
}

/// Year carried by a cell: an integral number, a timestamp, or a date string
pub fn cell_year(cell: &Cell) -> Option<i32> {
    match cell {
        Cell::Number(value) if value.is_finite() && value.fract() == 0.0 => {
            i32::try_from(*value as i64).ok()
        }
        Cell::Timestamp(ts) => Some(ts.year()),
        Cell::Text(text) => parse_timestamp(text).map(|ts| ts.year()),
        _ => None,
    }
}

fn derive_yield_timestamps(frame: Frame, schema: &Schema) -> AppResult<Frame> {
    if frame.has_column(&schema.timestamp) || !frame.has_column(&schema.year) {
        return Ok(frame);
    }

    let years = frame.column(&schema.year).unwrap_or_default();
    let values: Vec<Cell> = years
        .iter()
        .map(|cell| {
            cell_year(cell)
                .and_then(year_start)
                .map(Cell::Timestamp)
                .unwrap_or(Cell::Null)
        })
        .collect();

    tracing::info!(
        "Yield history has no '{}' column; deriving it from '{}'",
        schema.timestamp,
        schema.year
    );

    frame
        .with_column(&schema.timestamp, values)
        .map_err(|e| AppError::fusion(FusionStage::YieldEnrichment, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-05-01"), Some(expected));
        assert_eq!(parse_timestamp("01/05/2024"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T00:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024"), year_start(2024));
        assert_eq!(parse_timestamp("soon"), None);
    }

    #[test]
    fn test_parse_cell_null_tokens() {
        assert_eq!(parse_cell(""), Cell::Null);
        assert_eq!(parse_cell("NaN"), Cell::Null);
        assert_eq!(parse_cell("NA"), Cell::Null);
        assert_eq!(parse_cell("12.5"), Cell::Number(12.5));
        assert_eq!(parse_cell("argileux"), Cell::Text("argileux".to_string()));
    }

    #[test]
    fn test_cell_year() {
        assert_eq!(cell_year(&Cell::Number(2021.0)), Some(2021));
        assert_eq!(cell_year(&Cell::Number(2021.5)), None);
        assert_eq!(cell_year(&Cell::Text("2019-06-30".to_string())), Some(2019));
        assert_eq!(cell_year(&Cell::Null), None);
    }

    #[test]
    fn test_yield_timestamps_derived_from_year() {
        let schema = Schema::default();
        let frame = Frame::from_rows(
            "yield_history",
            vec!["parcelle_id".to_string(), "annee".to_string(), "rendement".to_string()],
            vec![
                vec!["P001".into(), 2020.0.into(), 5.0.into()],
                vec!["P001".into(), Cell::Null, 6.0.into()],
            ],
        )
        .unwrap();

        let derived = derive_yield_timestamps(frame, &schema).unwrap();
        assert_eq!(
            derived.timestamp(0, "date"),
            year_start(2020)
        );
        assert_eq!(derived.get(1, "date"), Some(Cell::Null));
    }

    #[test]
    fn test_offset_and_naive_dates_share_wall_clock() {
        let with_offset = parse_timestamp("2024-05-03T00:30:00+02:00").unwrap();
        let naive = parse_timestamp("2024-05-03 00:30:00").unwrap();
        assert_eq!(with_offset, naive);
        assert_eq!(with_offset.date(), NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    fn frames_with_monitoring_days(days: &[u32]) -> Dataset {
        let day = |d: u32| {
            Cell::Timestamp(
                NaiveDate::from_ymd_opt(2024, 5, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            )
        };
        let cols = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        Dataset::from_frames(
            Schema::default(),
            Frame::from_rows(
                "monitoring",
                cols(&["parcelle_id", "date"]),
                days.iter().map(|d| vec!["P001".into(), day(*d)]).collect(),
            )
            .unwrap(),
            Frame::from_rows("weather", cols(&["date"]), vec![]).unwrap(),
            Frame::from_rows("soil", cols(&["parcelle_id"]), vec![]).unwrap(),
            Frame::from_rows("yield_history", cols(&["parcelle_id", "annee"]), vec![]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_rebuilt_dataset_must_be_indexed_again() {
        let indexed = frames_with_monitoring_days(&[2, 9]).index_by_time().unwrap();
        assert!(indexed.is_indexed());

        let unsorted = frames_with_monitoring_days(&[9, 2]);
        let rebuilt = Dataset::from_frames(
            indexed.schema().clone(),
            unsorted.monitoring().clone(),
            indexed.weather().clone(),
            indexed.soil().clone(),
            indexed.yield_history().clone(),
        )
        .unwrap();
        assert!(!rebuilt.is_indexed());

        let reindexed = rebuilt.index_by_time().unwrap();
        assert!(reindexed.monitoring().is_sorted_by_timestamp("date"));
        assert_eq!(reindexed.monitoring(), indexed.monitoring());
    }
}
