//! Query kinds
//!
//! The closed set of analyses the Keen query API exposes. Each kind has a
//! fixed wire name (the last segment of the query URL) and a fixed set of
//! required parameters, checked by [`QueryParams::is_valid`](super::QueryParams::is_valid).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Analysis types supported by the query API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Number of events in a collection
    #[serde(rename = "count")]
    CountResource,
    /// Number of distinct values of a property
    CountUnique,
    /// Smallest numeric value of a property
    Minimum,
    /// Largest numeric value of a property
    Maximum,
    /// Mean of a numeric property
    Average,
    /// Median of a numeric property
    Median,
    /// Value at a given percentile of a numeric property
    Percentile,
    /// Sum of a numeric property
    #[serde(rename = "sum")]
    SumResource,
    /// List of distinct values of a property
    #[serde(rename = "select_unique")]
    SelectUniqueResource,
    /// Raw events, returned inline or mailed
    #[serde(rename = "extraction")]
    ExtractionResource,
    /// Ordered sequence of steps and the actors completing each
    Funnel,
    /// Several analyses over one collection in a single request
    MultiAnalysis,
}

impl QueryKind {
    /// Every kind, in declaration order
    pub const ALL: [QueryKind; 12] = [
        Self::CountResource,
        Self::CountUnique,
        Self::Minimum,
        Self::Maximum,
        Self::Average,
        Self::Median,
        Self::Percentile,
        Self::SumResource,
        Self::SelectUniqueResource,
        Self::ExtractionResource,
        Self::Funnel,
        Self::MultiAnalysis,
    ];

    /// Name used in the query URL and in multi-analysis `analysis_type`
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::CountResource => "count",
            Self::CountUnique => "count_unique",
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
            Self::Average => "average",
            Self::Median => "median",
            Self::Percentile => "percentile",
            Self::SumResource => "sum",
            Self::SelectUniqueResource => "select_unique",
            Self::ExtractionResource => "extraction",
            Self::Funnel => "funnel",
            Self::MultiAnalysis => "multi_analysis",
        }
    }

    /// Whether the kind needs a non-empty `target_property`
    pub fn requires_target_property(&self) -> bool {
        matches!(
            self,
            Self::CountUnique
                | Self::Minimum
                | Self::Maximum
                | Self::Average
                | Self::Median
                | Self::Percentile
                | Self::SumResource
                | Self::SelectUniqueResource
        )
    }

    /// Whether the kind needs a non-empty `event_collection`
    pub fn requires_event_collection(&self) -> bool {
        !matches!(self, Self::Funnel)
    }
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.wire_name() == normalized)
            .ok_or_else(|| format!("unknown query kind: {}", s))
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}
