//! HTTP handlers over the analysis snapshot

pub mod charts;
pub mod dashboard;
pub mod features;
pub mod health;
pub mod map;
pub mod parcels;
pub mod risk;

pub use charts::get_charts;
pub use dashboard::get_dashboard;
pub use features::get_features;
pub use health::health_check;
pub use map::get_map;
pub use parcels::get_parcel_trend;
pub use risk::get_risk;
