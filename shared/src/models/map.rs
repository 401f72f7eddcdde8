//! Map layer models

use serde::{Deserialize, Serialize};

use super::TrendDirection;
use crate::types::GpsCoordinates;

/// Initial view of the map
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MapView {
    pub center: GpsCoordinates,
    pub zoom: u8,
}

/// Popup content of a marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Popup {
    Yield {
        parcel_id: String,
        mean_yield_t_ha: f64,
        /// `None` for parcels with a single record
        trend: Option<TrendDirection>,
        recent_crops: Vec<String>,
    },
    Ndvi {
        parcel_id: String,
        ndvi: f64,
        zone: Option<String>,
    },
}

/// A filled circle marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Marker {
    pub position: GpsCoordinates,
    pub color: String,
    pub radius: u8,
    pub fill_opacity: f64,
    pub popup: Popup,
}

/// A weighted point of the risk heat layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HeatPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub weight: f64,
}

/// All layers of the agricultural map
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapLayers {
    pub view: Option<MapView>,
    pub yield_markers: Vec<Marker>,
    pub ndvi_markers: Vec<Marker>,
    pub risk_heat: Vec<HeatPoint>,
}
