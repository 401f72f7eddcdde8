//! Chart feed models: the series the dashboard charts bind to

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A dated value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDateTime,
    pub value: f64,
}

/// A chronological series for one parcel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParcelSeries {
    pub parcel_id: String,
    pub points: Vec<SeriesPoint>,
}

/// NDVI reading with its historical threshold band
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NdviPoint {
    pub date: NaiveDateTime,
    pub ndvi: f64,
    pub lower_threshold: Option<f64>,
    pub upper_threshold: Option<f64>,
    /// Reading falls outside a complete threshold band
    pub out_of_band: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NdviSeries {
    pub parcel_id: String,
    pub points: Vec<NdviPoint>,
}

/// One cell of the water stress / weather condition matrix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StressCell {
    pub water_stress: f64,
    pub condition: String,
    /// Risk score scaled to [0, 1] by the largest score in the table
    pub value: f64,
    pub color: String,
}

/// Everything the dashboard charts need
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartFeeds {
    pub yield_history: Vec<ParcelSeries>,
    pub ndvi: Vec<NdviSeries>,
    pub stress_matrix: Vec<StressCell>,
    pub predictions: Vec<ParcelSeries>,
}
