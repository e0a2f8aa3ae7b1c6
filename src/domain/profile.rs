use serde::{Deserialize, Serialize};

/// Semantic type inferred for a column by the profiler's precedence chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Date,
    Datetime,
    Currency,
    Numeric,
    Categorical,
    Text,
    Identifier,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

/// Semantic and statistical profile of one detected column, computed
/// once from the full row set of its file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSemanticProfile {
    pub name: String,
    pub semantic_type: SemanticType,
    pub confidence: f64,
    pub null_percentage: f64,
    pub unique_values: usize,
    pub sample_values: Vec<String>,
    /// Fraction of numeric/currency values beyond 3 standard deviations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlier_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<NumericStats>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub notes: Vec<String>,
}
