//! Common types used across the toolkit

use serde::{Deserialize, Serialize};

/// GPS coordinates (WGS84)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsCoordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build coordinates only when both parts are present and in range
    pub fn checked(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        let coordinates = Self::new(latitude?, longitude?);
        crate::validation::validate_coordinates(coordinates.latitude, coordinates.longitude)
            .ok()
            .map(|_| coordinates)
    }
}
