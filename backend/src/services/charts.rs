//! Dashboard chart feeds
//!
//! Series for the yield history, NDVI band, stress matrix and yield
//! prediction charts. Rendering is left to the client.

use chrono::NaiveDateTime;
use shared::{
    Cell, ChartFeeds, Frame, FusedFrame, LinearColorMapper, NdviPoint, NdviSeries, ParcelSeries,
    RiskReport, Schema, SeriesPoint, StressCell, RD_YL_BU_11,
};

use super::dataset::{parcel_key, Dataset};

pub struct ChartService;

impl ChartService {
    pub fn build(dataset: &Dataset, fused: &FusedFrame, risk: &RiskReport) -> ChartFeeds {
        let schema = dataset.schema();
        let feeds = ChartFeeds {
            yield_history: parcel_series(dataset.yield_history(), schema, &schema.yield_value),
            ndvi: ndvi_series(dataset.monitoring(), schema),
            stress_matrix: stress_matrix(fused, risk, schema),
            predictions: parcel_series(dataset.monitoring(), schema, &schema.predicted_yield),
        };

        tracing::debug!(
            "Chart feeds: {} yield series, {} NDVI series, {} stress cells, {} prediction series",
            feeds.yield_history.len(),
            feeds.ndvi.len(),
            feeds.stress_matrix.len(),
            feeds.predictions.len()
        );

        feeds
    }
}

/// Rows grouped by parcel, parcels in order of first appearance
fn group_by_parcel(frame: &Frame, schema: &Schema) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for row in 0..frame.len() {
        let Some(parcel_id) = frame.get(row, &schema.parcel_id).as_ref().and_then(parcel_key) else {
            continue;
        };
        match groups.iter_mut().find(|(id, _)| *id == parcel_id) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((parcel_id, vec![row])),
        }
    }
    groups
}

fn timestamp(frame: &Frame, row: usize, schema: &Schema) -> Option<NaiveDateTime> {
    frame.timestamp(row, &schema.timestamp)
}

/// Dated values of `column` per parcel. Empty when the column is absent.
fn parcel_series(frame: &Frame, schema: &Schema, column: &str) -> Vec<ParcelSeries> {
    if !frame.has_column(column) {
        return Vec::new();
    }

    group_by_parcel(frame, schema)
        .into_iter()
        .filter_map(|(parcel_id, rows)| {
            let mut points: Vec<SeriesPoint> = rows
                .into_iter()
                .filter_map(|row| {
                    Some(SeriesPoint {
                        date: timestamp(frame, row, schema)?,
                        value: frame.number(row, column)?,
                    })
                })
                .collect();
            points.sort_by_key(|p| p.date);
            (!points.is_empty()).then_some(ParcelSeries { parcel_id, points })
        })
        .collect()
}

fn ndvi_series(frame: &Frame, schema: &Schema) -> Vec<NdviSeries> {
    if !frame.has_column(&schema.ndvi) {
        return Vec::new();
    }

    let number = |row: usize, column: &str| frame.number(row, column);

    group_by_parcel(frame, schema)
        .into_iter()
        .filter_map(|(parcel_id, rows)| {
            let mut points: Vec<NdviPoint> = rows
                .into_iter()
                .filter_map(|row| {
                    let ndvi = number(row, &schema.ndvi)?;
                    let lower = number(row, &schema.lower_threshold);
                    let upper = number(row, &schema.upper_threshold);
                    let out_of_band = match (lower, upper) {
                        (Some(l), Some(u)) => shared::is_outside_thresholds(ndvi, l, u),
                        _ => false,
                    };
                    Some(NdviPoint {
                        date: timestamp(frame, row, schema)?,
                        ndvi,
                        lower_threshold: lower,
                        upper_threshold: upper,
                        out_of_band,
                    })
                })
                .collect();
            points.sort_by_key(|p| p.date);
            (!points.is_empty()).then_some(NdviSeries { parcel_id, points })
        })
        .collect()
}

/// One cell per fused row that has a water stress, a weather condition and
/// a risk score. Values are scaled by the largest score in the table.
fn stress_matrix(fused: &FusedFrame, risk: &RiskReport, schema: &Schema) -> Vec<StressCell> {
    let frame = &fused.frame;
    let max_risk = risk
        .metrics
        .iter()
        .filter_map(|m| m.risk_score)
        .fold(0.0_f64, f64::max);
    let mapper = LinearColorMapper::new(&RD_YL_BU_11, 0.0, 1.0);

    risk.metrics
        .iter()
        .enumerate()
        .filter_map(|(row, metric)| {
            let water_stress = frame.number(row, &schema.water_stress)?;
            let condition = match frame.get(row, &schema.weather_condition)? {
                Cell::Null => return None,
                cell => cell.render(),
            };
            let score = metric.risk_score?;
            let value = if max_risk > 0.0 { score / max_risk } else { 0.0 };
            Some(StressCell {
                water_stress,
                condition,
                value,
                color: mapper.color(value).to_string(),
            })
        })
        .collect()
}
