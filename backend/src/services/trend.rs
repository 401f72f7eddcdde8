//! Yield trend analysis
//!
//! Ordinary least squares of yield against year, per parcel.

use std::collections::{BTreeSet, HashMap};

use chrono::Datelike;
use shared::{Cell, FusedFrame, Schema, SchemaError, TemporalPattern, YieldPoint, YieldTrend};

use super::dataset::{cell_year, parcel_key, Dataset};
use crate::error::{AppError, AppResult, FusionStage};

/// Below this a sum of squares counts as zero
const EPSILON: f64 = 1e-12;

pub struct TrendService;

impl TrendService {
    /// Yield history and linear trend of one parcel
    pub fn get_temporal_patterns(dataset: &Dataset, parcel_id: &str) -> AppResult<TemporalPattern> {
        let schema = dataset.schema();
        let frame = dataset.yield_history();
        let parcels = frame
            .column(&schema.parcel_id)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: frame.name().to_string(),
                column: schema.parcel_id.clone(),
            })
            .map_err(|e| AppError::fusion(FusionStage::TrendAnalysis, e))?;

        let rows: Vec<usize> = parcels
            .iter()
            .enumerate()
            .filter(|(_, cell)| parcel_key(cell).as_deref() == Some(parcel_id))
            .map(|(i, _)| i)
            .collect();

        if rows.is_empty() {
            return Err(AppError::ParcelNotFound(parcel_id.to_string()));
        }

        let mut history: Vec<YieldPoint> = rows
            .into_iter()
            .filter_map(|row| {
                let year = frame
                    .get(row, &schema.year)
                    .as_ref()
                    .and_then(cell_year)
                    .or_else(|| frame.timestamp(row, &schema.timestamp).map(|ts| ts.year()))?;
                let yield_t_ha = frame.number(row, &schema.yield_value)?;
                Some(YieldPoint { year, yield_t_ha })
            })
            .collect();
        history.sort_by_key(|point| point.year);

        let distinct_years = history.iter().map(|p| p.year).collect::<BTreeSet<_>>().len();
        if distinct_years < 2 {
            return Err(AppError::InsufficientData {
                parcel_id: parcel_id.to_string(),
                distinct_years,
            });
        }

        let xs: Vec<f64> = history.iter().map(|p| f64::from(p.year)).collect();
        let ys: Vec<f64> = history.iter().map(|p| p.yield_t_ha).collect();
        let trend = fit_linear(&xs, &ys).ok_or_else(|| AppError::InsufficientData {
            parcel_id: parcel_id.to_string(),
            distinct_years,
        })?;

        tracing::debug!(
            "Trend for parcel {}: slope {:.3} t/ha/yr, r² {:.3} over {} records",
            parcel_id,
            trend.slope,
            trend.r_squared,
            history.len()
        );

        Ok(TemporalPattern {
            parcel_id: parcel_id.to_string(),
            history,
            trend,
        })
    }

    /// Add a `yield_trend` column holding each row's parcel slope. Parcels
    /// without a usable history get an empty cell.
    pub fn attach_yield_trends(fused: &FusedFrame, dataset: &Dataset) -> AppResult<FusedFrame> {
        let schema: &Schema = dataset.schema();
        let parcels = fused
            .frame
            .column(&schema.parcel_id)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: fused.frame.name().to_string(),
                column: schema.parcel_id.clone(),
            })
            .map_err(|e| AppError::fusion(FusionStage::TrendAnalysis, e))?;

        let mut slopes: HashMap<String, Option<f64>> = HashMap::new();
        let mut values = Vec::with_capacity(fused.len());

        for cell in &parcels {
            let Some(parcel_id) = parcel_key(cell) else {
                values.push(Cell::Null);
                continue;
            };

            if !slopes.contains_key(&parcel_id) {
                let slope = match Self::get_temporal_patterns(dataset, &parcel_id) {
                    Ok(pattern) => Some(pattern.trend.slope),
                    Err(AppError::ParcelNotFound(_)) | Err(AppError::InsufficientData { .. }) => {
                        None
                    }
                    Err(e) => return Err(e),
                };
                slopes.insert(parcel_id.clone(), slope);
            }
            values.push(Cell::from(slopes.get(&parcel_id).copied().flatten()));
        }

        let frame = fused
            .frame
            .with_column(&schema.yield_trend, values)
            .map_err(|e| AppError::fusion(FusionStage::TrendAnalysis, e))?;

        Ok(FusedFrame {
            frame,
            synthesized: fused.synthesized.clone(),
        })
    }
}

/// Least-squares fit of `ys` against `xs`. `None` when there are fewer than
/// two points or all `xs` are equal.
pub fn fit_linear(xs: &[f64], ys: &[f64]) -> Option<YieldTrend> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx <= EPSILON {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_res: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();

    // Constant yields: a flat line fits exactly
    let r_squared = if ss_tot <= EPSILON {
        if ss_res <= EPSILON {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    Some(YieldTrend {
        slope,
        intercept,
        r_squared,
    })
}

/// Slope of values against their position in the sequence
pub fn index_slope(values: &[f64]) -> Option<f64> {
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    fit_linear(&xs, values).map(|trend| trend.slope)
}
