//! Input source identifiers

use serde::{Deserialize, Serialize};

/// The four tables the pipeline loads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Monitoring,
    Weather,
    Soil,
    YieldHistory,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Monitoring,
        SourceKind::Weather,
        SourceKind::Soil,
        SourceKind::YieldHistory,
    ];

    /// Name given to the loaded frame, also used in schema error messages
    pub fn table_name(&self) -> &'static str {
        match self {
            SourceKind::Monitoring => "monitoring",
            SourceKind::Weather => "weather",
            SourceKind::Soil => "soil",
            SourceKind::YieldHistory => "yield_history",
        }
    }

    /// French label used in bilingual error messages
    pub fn label_fr(&self) -> &'static str {
        match self {
            SourceKind::Monitoring => "suivi des cultures",
            SourceKind::Weather => "météo détaillée",
            SourceKind::Soil => "sols",
            SourceKind::YieldHistory => "historique des rendements",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Monitoring => write!(f, "Crop monitoring"),
            SourceKind::Weather => write!(f, "Weather"),
            SourceKind::Soil => write!(f, "Soil"),
            SourceKind::YieldHistory => write!(f, "Yield history"),
        }
    }
}
