//! Shared types and models for the agricultural monitoring toolkit
//!
//! This crate holds the tabular frame, the column-name contract and the
//! result models exchanged between the pipeline, the HTTP layer and the
//! chart and map consumers. It performs no I/O.

pub mod colormap;
pub mod frame;
pub mod models;
pub mod schema;
pub mod types;
pub mod validation;

pub use colormap::*;
pub use frame::*;
pub use models::*;
pub use schema::*;
pub use types::*;
pub use validation::*;
