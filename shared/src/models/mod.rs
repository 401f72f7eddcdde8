//! Domain models for the agricultural monitoring toolkit

mod analytics;
mod charts;
mod fused;
mod map;
mod source;

pub use analytics::*;
pub use charts::*;
pub use fused::*;
pub use map::*;
pub use source::*;
