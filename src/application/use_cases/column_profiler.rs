// ============================================================
// COLUMN SEMANTIC PROFILER
// ============================================================
// Classifies each column's semantic type by a fixed precedence chain
// and computes null/uniqueness/outlier statistics over the row set.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::domain::item::NormalizedItem;
use crate::domain::profile::{ColumnSemanticProfile, NumericStats, SemanticType};
use crate::domain::summary::{IssueSeverity, StructuralIssue};
use crate::infrastructure::config::PipelineConfig;
use crate::shared::numeric::parse_flexible_number;

const CURRENCY_DENSITY_THRESHOLD: f64 = 0.6;
const NUMERIC_DENSITY_THRESHOLD: f64 = 0.7;
const DATE_DENSITY_THRESHOLD: f64 = 0.6;
const IDENTIFIER_UNIQUENESS_THRESHOLD: f64 = 0.7;
const CATEGORICAL_UNIQUENESS_THRESHOLD: f64 = 0.1;
const OUTLIER_RATE_THRESHOLD: f64 = 0.05;
const NULL_PERCENTAGE_THRESHOLD: f64 = 30.0;

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}-\d{2}-\d{2}([T ]\d{1,2}:\d{2}(:\d{2})?([.+\-Z].*)?)?$").unwrap(),
        Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}( \d{1,2}:\d{2}(:\d{2})?)?$").unwrap(),
    ]
});

static TIME_COMPONENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}:\d{2}").unwrap());

static IDENTIFIER_NAME_HINTS: &[&str] = &[
    "id", "codigo", "código", "cnpj", "cpf", "chave", "numero", "número", "nfe",
];

pub struct ProfileOutcome {
    pub profiles: Vec<ColumnSemanticProfile>,
    pub issues: Vec<StructuralIssue>,
}

pub fn profile_columns(
    columns: &[String],
    items: &[NormalizedItem],
    config: &PipelineConfig,
) -> ProfileOutcome {
    let sampled = sample_items(items, config.max_profile_rows);
    let row_count = sampled.len();

    let mut profiles = Vec::with_capacity(columns.len());
    let mut issues = Vec::new();

    for column in columns {
        let values: Vec<Option<String>> = sampled.iter().map(|item| item.text(column)).collect();
        let non_null: Vec<&String> = values.iter().flatten().collect();

        let null_percentage = if row_count > 0 {
            (row_count - non_null.len()) as f64 / row_count as f64 * 100.0
        } else {
            0.0
        };
        let unique_values = non_null.iter().collect::<HashSet<_>>().len();
        let uniqueness = if row_count > 0 {
            unique_values as f64 / row_count as f64
        } else {
            0.0
        };

        let density = |pred: &dyn Fn(&str) -> bool| -> f64 {
            if non_null.is_empty() {
                return 0.0;
            }
            non_null.iter().filter(|v| pred(v.as_str())).count() as f64 / non_null.len() as f64
        };

        let currency_density = density(&is_currency_value);
        let numeric_density = density(&|v| parse_flexible_number(v).is_some());
        let date_density = density(&is_date_value);
        let has_time = non_null
            .iter()
            .any(|v| is_date_value(v) && TIME_COMPONENT.is_match(v));

        let (semantic_type, confidence) = if currency_density > CURRENCY_DENSITY_THRESHOLD {
            (SemanticType::Currency, currency_density)
        } else if numeric_density > NUMERIC_DENSITY_THRESHOLD {
            (SemanticType::Numeric, numeric_density)
        } else if date_density > DATE_DENSITY_THRESHOLD {
            if has_time {
                (SemanticType::Datetime, date_density)
            } else {
                (SemanticType::Date, date_density)
            }
        } else if identifier_like_name(column) && uniqueness > IDENTIFIER_UNIQUENESS_THRESHOLD {
            (SemanticType::Identifier, uniqueness)
        } else if uniqueness <= CATEGORICAL_UNIQUENESS_THRESHOLD {
            (SemanticType::Categorical, 1.0 - uniqueness)
        } else {
            (SemanticType::Text, 0.5)
        };

        let mut notes = Vec::new();
        let mut stats = None;
        let mut outlier_rate = None;

        if matches!(semantic_type, SemanticType::Currency | SemanticType::Numeric) {
            let numbers: Vec<f64> = non_null
                .iter()
                .filter_map(|v| parse_flexible_number(v))
                .collect();
            if !numbers.is_empty() {
                let (computed, rate) = numeric_stats(&numbers);
                if rate > OUTLIER_RATE_THRESHOLD {
                    issues.push(StructuralIssue {
                        code: "COLUMN_OUTLIERS".to_string(),
                        message: format!(
                            "Coluna \"{}\" tem {:.1}% de valores a mais de 3 desvios-padrão da média.",
                            column,
                            rate * 100.0
                        ),
                        severity: IssueSeverity::Warn,
                        hint: None,
                    });
                }
                stats = Some(computed);
                outlier_rate = Some(rate);
            }
        }

        let mut duplicates_detected = None;
        if semantic_type == SemanticType::Identifier {
            let has_duplicates = unique_values < non_null.len();
            duplicates_detected = Some(has_duplicates);
            if has_duplicates {
                issues.push(StructuralIssue {
                    code: "COLUMN_DUPLICATE_IDS".to_string(),
                    message: format!(
                        "Coluna identificadora \"{}\" contém valores duplicados.",
                        column
                    ),
                    severity: IssueSeverity::Warn,
                    hint: None,
                });
                notes.push("duplicatas em coluna identificadora".to_string());
            }
        }

        if null_percentage > NULL_PERCENTAGE_THRESHOLD {
            issues.push(StructuralIssue {
                code: "COLUMN_HIGH_NULLS".to_string(),
                message: format!(
                    "Coluna \"{}\" tem {:.1}% de valores vazios.",
                    column, null_percentage
                ),
                severity: IssueSeverity::Warn,
                hint: None,
            });
        }

        profiles.push(ColumnSemanticProfile {
            name: column.clone(),
            semantic_type,
            confidence,
            null_percentage,
            unique_values,
            sample_values: non_null.iter().take(5).map(|v| (*v).clone()).collect(),
            outlier_rate,
            duplicates_detected,
            stats: stats.clone(),
            notes,
        });
    }

    ProfileOutcome { profiles, issues }
}

/// Even sampling for very large row sets, in file order.
fn sample_items(items: &[NormalizedItem], cap: usize) -> Vec<&NormalizedItem> {
    if items.len() <= cap || cap == 0 {
        return items.iter().collect();
    }
    let step = items.len() / cap;
    items
        .iter()
        .step_by(step.max(1))
        .take(cap)
        .collect()
}

fn numeric_stats(numbers: &[f64]) -> (NumericStats, f64) {
    let count = numbers.len() as f64;
    let mean = numbers.iter().sum::<f64>() / count;
    let variance = numbers.iter().map(|n| (n - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();

    let mut sorted = numbers.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if sorted.len() % 2 == 1 {
        sorted[sorted.len() / 2]
    } else {
        (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
    };

    let outliers = if std_dev > 0.0 {
        numbers
            .iter()
            .filter(|n| (*n - mean).abs() > 3.0 * std_dev)
            .count()
    } else {
        0
    };

    (
        NumericStats {
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            mean: Some(mean),
            median: Some(median),
            std_dev: Some(std_dev),
        },
        outliers as f64 / count,
    )
}

fn is_currency_value(value: &str) -> bool {
    let trimmed = value.trim();
    let has_symbol = trimmed.contains("R$")
        || trimmed.starts_with('$')
        || trimmed.starts_with('€')
        || trimmed.starts_with('£')
        || trimmed.ends_with('$')
        || trimmed.ends_with('€')
        || trimmed.ends_with('£');
    has_symbol && parse_flexible_number(trimmed).is_some()
}

fn is_date_value(value: &str) -> bool {
    let trimmed = value.trim();
    DATE_PATTERNS.iter().any(|p| p.is_match(trimmed))
}

fn identifier_like_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    IDENTIFIER_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn items_from(column: &str, values: &[&str]) -> Vec<NormalizedItem> {
        values
            .iter()
            .map(|v| {
                let mut item = NormalizedItem::new();
                if !v.is_empty() {
                    item.set(column, Value::String(v.to_string()));
                }
                item
            })
            .collect()
    }

    fn profile_one(column: &str, values: &[&str]) -> ProfileOutcome {
        let items = items_from(column, values);
        profile_columns(&[column.to_string()], &items, &PipelineConfig::default())
    }

    #[test]
    fn test_currency_column() {
        let outcome = profile_one(
            "valor",
            &["R$ 10,00", "R$ 25,50", "R$ 31,00", "sem valor"],
        );
        let profile = &outcome.profiles[0];
        assert_eq!(profile.semantic_type, SemanticType::Currency);
        assert!(profile.stats.is_some());
    }

    #[test]
    fn test_numeric_column_with_outlier_issue() {
        // 20 tight values and one far outlier: rate 1/21 ≈ 4.8% stays
        // under the threshold, so use a shorter column.
        let values: Vec<String> = (0..10)
            .map(|i| format!("{}", 100 + i))
            .chain(std::iter::once("100000".to_string()))
            .collect();
        let refs: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
        let outcome = profile_one("qtd", &refs);
        let profile = &outcome.profiles[0];
        assert_eq!(profile.semantic_type, SemanticType::Numeric);
        assert!(profile.outlier_rate.unwrap() > 0.05);
        assert!(outcome.issues.iter().any(|i| i.code == "COLUMN_OUTLIERS"));
    }

    #[test]
    fn test_date_and_datetime_columns() {
        let outcome = profile_one("data", &["2024-07-01", "2024-07-02", "01/08/2024"]);
        assert_eq!(outcome.profiles[0].semantic_type, SemanticType::Date);

        let outcome = profile_one(
            "emitido_em",
            &["2024-07-01T10:30:00", "2024-07-02 11:00", "2024-07-03"],
        );
        assert_eq!(outcome.profiles[0].semantic_type, SemanticType::Datetime);
    }

    #[test]
    fn test_identifier_with_duplicates_warns() {
        let outcome = profile_one(
            "nfe_id",
            &["ID-A1", "ID-B2", "ID-C3", "ID-D4", "ID-A1"],
        );
        let profile = &outcome.profiles[0];
        assert_eq!(profile.semantic_type, SemanticType::Identifier);
        assert_eq!(profile.duplicates_detected, Some(true));
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.code == "COLUMN_DUPLICATE_IDS"));
    }

    #[test]
    fn test_categorical_low_uniqueness() {
        let values: Vec<&str> = std::iter::repeat("Papelaria")
            .take(15)
            .chain(std::iter::repeat("Limpeza").take(15))
            .collect();
        let outcome = profile_one("setor", &values);
        assert_eq!(outcome.profiles[0].semantic_type, SemanticType::Categorical);
    }

    #[test]
    fn test_high_null_percentage_warns() {
        let outcome = profile_one("obs", &["nota importante", "", "", ""]);
        assert!(outcome.profiles[0].null_percentage > 30.0);
        assert!(outcome.issues.iter().any(|i| i.code == "COLUMN_HIGH_NULLS"));
    }

    #[test]
    fn test_comma_decimal_values_count_as_numeric() {
        let outcome = profile_one("preco", &["1.234,56", "10,00", "7,25"]);
        assert_eq!(outcome.profiles[0].semantic_type, SemanticType::Numeric);
    }
}
