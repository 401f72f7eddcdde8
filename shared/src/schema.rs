//! Column-name contract between the input files, the fusion pipeline and
//! the chart and map consumers.
//!
//! Defaults follow the column names of the monitoring exports
//! (`monitoring_cultures.csv`, `meteo_detaillee.csv`, `sols.csv`,
//! `historique_rendements.csv`), including the accented `température`
//! weather column. Any of them can be remapped through the `[columns]`
//! configuration section.

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, SchemaError};

/// Bumped whenever a default column name or the output contract changes
pub const SCHEMA_VERSION: u32 = 1;

/// Column names used across the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    pub parcel_id: String,
    pub timestamp: String,
    pub year: String,
    pub yield_value: String,
    pub crop: String,
    pub ndvi: String,
    pub lower_threshold: String,
    pub upper_threshold: String,
    pub water_stress: String,
    pub temperature: String,
    pub weather_condition: String,
    pub predicted_yield: String,
    pub soil_risk: String,
    pub latitude: String,
    pub longitude: String,
    pub zone: String,
    /// Derived
    pub risk_score: String,
    /// Derived
    pub yield_trend: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            parcel_id: "parcelle_id".to_string(),
            timestamp: "date".to_string(),
            year: "annee".to_string(),
            yield_value: "rendement".to_string(),
            crop: "culture".to_string(),
            ndvi: "ndvi".to_string(),
            lower_threshold: "lower_threshold".to_string(),
            upper_threshold: "upper_threshold".to_string(),
            water_stress: "stress_hydrique".to_string(),
            temperature: "température".to_string(),
            weather_condition: "meteo_condition".to_string(),
            predicted_yield: "predicted_yield".to_string(),
            soil_risk: "risque".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            zone: "zone".to_string(),
            risk_score: "risk_score".to_string(),
            yield_trend: "yield_trend".to_string(),
        }
    }
}

impl Schema {
    /// Columns every fused frame must expose to chart and map code. Water
    /// stress and temperature are not listed: without them risk scoring
    /// degrades instead of failing.
    pub fn fused_contract(&self) -> [&str; 2] {
        [self.parcel_id.as_str(), self.timestamp.as_str()]
    }

    /// Check a frame against the fused contract, reporting the first gap
    pub fn check_fused(&self, frame: &Frame) -> Result<(), SchemaError> {
        for column in self.fused_contract() {
            frame.require_column(column)?;
        }
        Ok(())
    }
}
