//! Pipeline and presentation services for the agricultural monitoring toolkit

pub mod charts;
pub mod dataset;
pub mod fusion;
pub mod map;
pub mod reporting;
pub mod risk;
pub mod trend;

pub use charts::ChartService;
pub use dataset::{DataSources, Dataset};
pub use fusion::FusionService;
pub use map::MapService;
pub use reporting::{DashboardSummary, ReportingService};
pub use risk::RiskService;
pub use trend::TrendService;
