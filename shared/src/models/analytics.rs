//! Risk and yield-trend models

use serde::{Deserialize, Serialize};

/// How a risk report was produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RiskStatus {
    /// Both inputs were read from the sources
    Computed,
    /// Computed, but from placeholder columns
    Synthetic { columns: Vec<String> },
    /// Inputs missing; every score is the fallback 0
    Degraded { missing: Vec<String> },
}

impl RiskStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, RiskStatus::Degraded { .. })
    }

    /// Whether the scores reflect source readings only
    pub fn is_real(&self) -> bool {
        matches!(self, RiskStatus::Computed)
    }
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStatus::Computed => write!(f, "computed"),
            RiskStatus::Synthetic { columns } => {
                write!(f, "synthetic ({})", columns.join(", "))
            }
            RiskStatus::Degraded { missing } => {
                write!(f, "degraded (missing {})", missing.join(", "))
            }
        }
    }
}

/// Risk score for one fused row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskMetric {
    pub parcel_id: String,
    /// `None` when the row lacks one of the two readings
    pub risk_score: Option<f64>,
}

/// One risk metric per fused row, in fused order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskReport {
    #[serde(flatten)]
    pub status: RiskStatus,
    pub metrics: Vec<RiskMetric>,
}

impl RiskReport {
    pub fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }

    /// Mean over rows that have a score
    pub fn mean_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.metrics.iter().filter_map(|m| m.risk_score).collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

/// One (year, yield) observation of a parcel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct YieldPoint {
    pub year: i32,
    /// Tonnes per hectare
    pub yield_t_ha: f64,
}

/// Least-squares line of yield against year
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct YieldTrend {
    /// Tonnes per hectare per year
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination of the fit
    pub r_squared: f64,
}

impl YieldTrend {
    pub fn direction(&self) -> TrendDirection {
        TrendDirection::from_slope(self.slope)
    }
}

/// Yield history and its trend for one parcel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalPattern {
    pub parcel_id: String,
    /// Chronological
    pub history: Vec<YieldPoint>,
    pub trend: YieldTrend,
}

/// Sign of a yield trend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

impl TrendDirection {
    /// Flat trends count as decreasing
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        }
    }

    pub fn label_fr(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "Croissant",
            TrendDirection::Decreasing => "Décroissant",
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "Increasing"),
            TrendDirection::Decreasing => write!(f, "Decreasing"),
        }
    }
}
