//! Immutable analysis snapshot
//!
//! Built once at startup from the configured sources and shared read-only
//! by every request handler.

use chrono::{DateTime, Utc};
use shared::{ChartFeeds, FusedFrame, MapLayers, PlaceholderPolicy, RiskReport};

use crate::config::Config;
use crate::error::{AppError, AppResult, FusionStage};
use crate::services::{
    ChartService, Dataset, FusionService, MapService, RiskService, TrendService,
};

#[derive(Debug)]
pub struct Snapshot {
    /// Indexed by time
    pub dataset: Dataset,
    /// Fused rows with `risk_score` and `yield_trend` columns
    pub features: FusedFrame,
    pub risk: RiskReport,
    pub charts: ChartFeeds,
    pub map: MapLayers,
    pub built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Load the configured sources and run the whole pipeline
    pub fn build(config: &Config) -> AppResult<Self> {
        let dataset = Dataset::load(&config.data, &config.columns)?;
        Self::from_dataset(dataset, config.placeholder, config.map.yield_scale_max)
    }

    pub fn from_dataset(
        dataset: Dataset,
        placeholder: PlaceholderPolicy,
        yield_scale_max: f64,
    ) -> AppResult<Self> {
        // Fused rows keep the monitoring columns under their own names
        dataset
            .schema()
            .check_fused(dataset.monitoring())
            .map_err(|e| AppError::fusion(FusionStage::FeatureContract, e))?;

        let dataset = dataset.index_by_time()?;
        let schema = dataset.schema();

        let fused = FusionService::new(placeholder).prepare_features(&dataset)?;
        let risk = RiskService::calculate_risk_metrics(&fused, schema)?;
        let charts = ChartService::build(&dataset, &fused, &risk);
        let map = MapService::new(yield_scale_max).build(&dataset);

        let scored = RiskService::with_risk_score(&fused, schema)?;
        let features = TrendService::attach_yield_trends(&scored, &dataset)?;

        Ok(Self {
            dataset,
            features,
            risk,
            charts,
            map,
            built_at: Utc::now(),
        })
    }

    /// Log the pipeline outcome and the yield trend of one parcel
    pub fn log_report(&self, parcel_id: &str) {
        tracing::info!(
            "Snapshot ready: {} fused rows, risk {}",
            self.features.len(),
            self.risk.status
        );
        if let Some(mean) = self.risk.mean_score() {
            tracing::info!("Mean risk score: {:.2}", mean);
        }

        match TrendService::get_temporal_patterns(&self.dataset, parcel_id) {
            Ok(pattern) => tracing::info!(
                "Parcel {}: yield trend {:.2} t/ha/yr ({}), r² {:.1}%",
                parcel_id,
                pattern.trend.slope,
                pattern.trend.direction().label_fr(),
                pattern.trend.r_squared * 100.0
            ),
            Err(e) => tracing::warn!("No yield trend for parcel {}: {}", parcel_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::{Cell, Frame, Schema, SchemaError};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn sample_cell(column: &str) -> Cell {
        match column {
            "parcelle_id" => "P001".into(),
            "date" => NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .into(),
            _ => Cell::Null,
        }
    }

    fn dataset(monitoring_columns: &[&str]) -> Dataset {
        let monitoring = Frame::from_rows(
            "monitoring",
            cols(monitoring_columns),
            vec![monitoring_columns.iter().map(|name| sample_cell(name)).collect()],
        )
        .unwrap();
        Dataset::from_frames(
            Schema::default(),
            monitoring,
            Frame::from_rows("weather", cols(&["date"]), vec![]).unwrap(),
            Frame::from_rows("soil", cols(&["parcelle_id"]), vec![]).unwrap(),
            Frame::from_rows("yield_history", cols(&["parcelle_id", "annee"]), vec![]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_monitoring_without_parcel_id_breaks_contract() {
        let err = Snapshot::from_dataset(dataset(&["date", "ndvi"]), PlaceholderPolicy::Disabled, 12.0)
            .unwrap_err();
        match err {
            AppError::Fusion {
                stage: FusionStage::FeatureContract,
                cause: SchemaError::MissingColumn { column, .. },
            } => assert_eq!(column, "parcelle_id"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_monitoring_without_date_breaks_contract() {
        let err = Snapshot::from_dataset(
            dataset(&["parcelle_id", "ndvi"]),
            PlaceholderPolicy::Disabled,
            12.0,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Fusion {
                stage: FusionStage::FeatureContract,
                ..
            }
        ));
    }

    #[test]
    fn test_contract_columns_are_enough_to_build() {
        let snapshot = Snapshot::from_dataset(
            dataset(&["parcelle_id", "date"]),
            PlaceholderPolicy::Disabled,
            12.0,
        )
        .unwrap();
        assert_eq!(snapshot.features.len(), 1);
        assert!(snapshot.risk.status.is_degraded());
    }
}
