//! Composite risk score: the mean of water stress and temperature

use shared::{Cell, FusedFrame, RiskMetric, RiskReport, RiskStatus, Schema};

use crate::error::{AppError, AppResult, FusionStage};

pub struct RiskService;

impl RiskService {
    /// One metric per fused row. Rows missing either reading get no score;
    /// when a whole input column is missing every row scores 0 and the
    /// report is marked degraded.
    pub fn calculate_risk_metrics(fused: &FusedFrame, schema: &Schema) -> AppResult<RiskReport> {
        let frame = &fused.frame;
        frame
            .require_column(&schema.parcel_id)
            .map_err(|e| AppError::fusion(FusionStage::RiskScoring, e))?;

        let missing: Vec<String> = [&schema.water_stress, &schema.temperature]
            .into_iter()
            .filter(|column| !frame.has_column(column))
            .cloned()
            .collect();

        let parcel_ids = (0..frame.len()).map(|row| {
            frame
                .get(row, &schema.parcel_id)
                .map(|cell| cell.render())
                .unwrap_or_default()
        });

        if !missing.is_empty() {
            tracing::warn!(
                "Risk scores degraded: column(s) {} missing, every row scored 0",
                missing.join(", ")
            );
            return Ok(RiskReport {
                status: RiskStatus::Degraded { missing },
                metrics: parcel_ids
                    .map(|parcel_id| RiskMetric {
                        parcel_id,
                        risk_score: Some(0.0),
                    })
                    .collect(),
            });
        }

        let metrics = parcel_ids
            .enumerate()
            .map(|(row, parcel_id)| RiskMetric {
                parcel_id,
                risk_score: score(fused, schema, row),
            })
            .collect();

        let synthesized: Vec<String> = [&schema.water_stress, &schema.temperature]
            .into_iter()
            .filter(|column| fused.is_synthesized(column))
            .cloned()
            .collect();
        let status = if synthesized.is_empty() {
            RiskStatus::Computed
        } else {
            RiskStatus::Synthetic {
                columns: synthesized,
            }
        };

        tracing::debug!("Risk scores computed for {} rows ({})", frame.len(), status);

        Ok(RiskReport { status, metrics })
    }

    /// The fused frame with a `risk_score` column appended
    pub fn with_risk_score(fused: &FusedFrame, schema: &Schema) -> AppResult<FusedFrame> {
        let report = Self::calculate_risk_metrics(fused, schema)?;
        let values = report
            .metrics
            .iter()
            .map(|metric| Cell::from(metric.risk_score))
            .collect();
        let frame = fused
            .frame
            .with_column(&schema.risk_score, values)
            .map_err(|e| AppError::fusion(FusionStage::RiskScoring, e))?;

        Ok(FusedFrame {
            frame,
            synthesized: fused.synthesized.clone(),
        })
    }
}

fn score(fused: &FusedFrame, schema: &Schema, row: usize) -> Option<f64> {
    let stress = fused.frame.number(row, &schema.water_stress)?;
    let temperature = fused.frame.number(row, &schema.temperature)?;
    Some((stress + temperature) / 2.0)
}
