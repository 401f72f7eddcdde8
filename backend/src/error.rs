//! Error handling for the agricultural monitoring toolkit
//!
//! Provides consistent error responses in English and French

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use polars::prelude::PolarsError;
use serde::Serialize;
use shared::{SchemaError, SourceKind};
use thiserror::Error;

/// Pipeline stage at which a schema problem surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStage {
    TemporalIndex,
    WeatherAlignment,
    SoilEnrichment,
    YieldEnrichment,
    RiskScoring,
    TrendAnalysis,
    FeatureContract,
}

impl std::fmt::Display for FusionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FusionStage::TemporalIndex => write!(f, "temporal indexing"),
            FusionStage::WeatherAlignment => write!(f, "weather alignment"),
            FusionStage::SoilEnrichment => write!(f, "soil enrichment"),
            FusionStage::YieldEnrichment => write!(f, "yield enrichment"),
            FusionStage::RiskScoring => write!(f, "risk scoring"),
            FusionStage::TrendAnalysis => write!(f, "trend analysis"),
            FusionStage::FeatureContract => write!(f, "feature contract check"),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Pipeline errors
    #[error("{input} source not found at {}", .path.display())]
    MissingSource { input: SourceKind, path: PathBuf },

    #[error("Fusion failed during {stage}: {cause}")]
    Fusion {
        stage: FusionStage,
        #[source]
        cause: SchemaError,
    },

    #[error("Parcel not found: {0}")]
    ParcelNotFound(String),

    #[error("Insufficient data for parcel {parcel_id}: {distinct_years} distinct year(s)")]
    InsufficientData {
        parcel_id: String,
        distinct_years: usize,
    },

    // Input errors
    #[error("Could not read {input} source: {cause}")]
    Csv {
        input: SourceKind,
        #[source]
        cause: PolarsError,
    },

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn fusion(stage: FusionStage, cause: SchemaError) -> Self {
        AppError::Fusion { stage, cause }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::MissingSource { input, path } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "MISSING_SOURCE".to_string(),
                    message_en: self.to_string(),
                    message_fr: format!(
                        "Le fichier {} n'existe pas ({})",
                        path.display(),
                        input.label_fr()
                    ),
                    field: Some(input.table_name().to_string()),
                },
            ),
            AppError::Fusion { stage, cause } => {
                let field = match cause {
                    SchemaError::MissingColumn { column, .. } => Some(column.clone()),
                    SchemaError::RaggedRow { .. } | SchemaError::Engine { .. } => None,
                };
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorDetail {
                        code: "FUSION_ERROR".to_string(),
                        message_en: format!("Fusion failed during {}: {}", stage, cause),
                        message_fr: format!(
                            "Erreur lors de la préparation des caractéristiques : {}",
                            cause
                        ),
                        field,
                    },
                )
            }
            AppError::ParcelNotFound(parcel_id) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "PARCEL_NOT_FOUND".to_string(),
                    message_en: format!("Parcel {} not found", parcel_id),
                    message_fr: format!(
                        "La parcelle {} n'existe pas dans les données",
                        parcel_id
                    ),
                    field: Some("parcel_id".to_string()),
                },
            ),
            AppError::InsufficientData {
                parcel_id,
                distinct_years,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_DATA".to_string(),
                    message_en: format!(
                        "Parcel {} has {} distinct year(s) of yield data; at least 2 are required",
                        parcel_id, distinct_years
                    ),
                    message_fr: format!(
                        "La parcelle {} n'a que {} année(s) de rendement ; 2 au minimum sont nécessaires",
                        parcel_id, distinct_years
                    ),
                    field: Some("parcel_id".to_string()),
                },
            ),
            AppError::Csv { input, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CSV_ERROR".to_string(),
                    message_en: self.to_string(),
                    message_fr: format!(
                        "Erreur lors du chargement des données ({})",
                        input.label_fr()
                    ),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_fr: "Erreur interne du serveur".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_names_the_source() {
        let err = AppError::MissingSource {
            input: SourceKind::Soil,
            path: PathBuf::from("data/sols.csv"),
        };
        assert_eq!(err.to_string(), "Soil source not found at data/sols.csv");
    }

    #[test]
    fn test_fusion_error_keeps_cause() {
        let err = AppError::fusion(
            FusionStage::SoilEnrichment,
            SchemaError::MissingColumn {
                table: "soil".to_string(),
                column: "parcelle_id".to_string(),
            },
        );
        let source = std::error::Error::source(&err).expect("cause should be exposed");
        assert_eq!(
            source.to_string(),
            "column 'parcelle_id' is missing from table 'soil'"
        );
    }

    #[test]
    fn test_status_codes() {
        let not_found = AppError::ParcelNotFound("UNKNOWN".to_string()).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let insufficient = AppError::InsufficientData {
            parcel_id: "P002".to_string(),
            distinct_years: 1,
        }
        .into_response();
        assert_eq!(insufficient.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
