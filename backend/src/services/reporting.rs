//! Reporting service for the dashboard summary and data export

use std::collections::BTreeSet;

use serde::Serialize;
use shared::{Frame, FusedFrame, RiskReport, RiskStatus, TrendDirection, SCHEMA_VERSION};

use super::dataset::{parcel_key, Dataset};
use super::trend::TrendService;
use crate::error::{AppError, AppResult};

/// Row counts of each loaded source
#[derive(Debug, Serialize, PartialEq)]
pub struct SourceCounts {
    pub monitoring: usize,
    pub weather: usize,
    pub soil: usize,
    pub yield_history: usize,
}

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub schema_version: u32,
    pub sources: SourceCounts,
    pub fused_rows: usize,
    pub parcel_count: usize,
    pub risk_status: RiskStatus,
    pub mean_risk_score: Option<f64>,
    pub synthesized_columns: Vec<String>,
    pub increasing_parcels: usize,
    pub decreasing_parcels: usize,
}

pub struct ReportingService;

impl ReportingService {
    pub fn dashboard_summary(
        dataset: &Dataset,
        features: &FusedFrame,
        risk: &RiskReport,
    ) -> AppResult<DashboardSummary> {
        let schema = dataset.schema();
        let parcels: BTreeSet<String> = [dataset.monitoring(), dataset.soil(), dataset.yield_history()]
            .into_iter()
            .filter_map(|frame| frame.column(&schema.parcel_id))
            .flatten()
            .filter_map(|cell| parcel_key(&cell))
            .collect();

        // Parcels without a usable history are left out of the trend counts
        let mut directions: Vec<TrendDirection> = Vec::with_capacity(parcels.len());
        for parcel_id in &parcels {
            match TrendService::get_temporal_patterns(dataset, parcel_id) {
                Ok(pattern) => directions.push(pattern.trend.direction()),
                Err(AppError::ParcelNotFound(_)) | Err(AppError::InsufficientData { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(DashboardSummary {
            schema_version: SCHEMA_VERSION,
            sources: SourceCounts {
                monitoring: dataset.monitoring().len(),
                weather: dataset.weather().len(),
                soil: dataset.soil().len(),
                yield_history: dataset.yield_history().len(),
            },
            fused_rows: features.len(),
            parcel_count: parcels.len(),
            risk_status: risk.status.clone(),
            mean_risk_score: risk.mean_score(),
            synthesized_columns: features.synthesized.clone(),
            increasing_parcels: directions
                .iter()
                .filter(|d| **d == TrendDirection::Increasing)
                .count(),
            decreasing_parcels: directions
                .iter()
                .filter(|d| **d == TrendDirection::Decreasing)
                .count(),
        })
    }

    /// Export a frame as CSV, header first
    pub fn export_to_csv(frame: &Frame) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(frame.columns())
            .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        for row in frame.rows() {
            wtr.write_record(row.iter().map(|cell| cell.render()))
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}
