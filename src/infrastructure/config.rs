// ============================================================
// PIPELINE CONFIGURATION
// ============================================================
// Defaults merged with an optional `fiscaudit.toml` and `FISCAUDIT_*`
// environment variables.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Relative tolerance for quantity x unit price vs declared total.
    pub value_calc_relative_tolerance: f64,
    /// Absolute tolerance (currency units) for the same check.
    pub value_calc_absolute_tolerance: f64,
    /// Absolute tolerance for tax base x rate vs declared tax value.
    pub icms_calc_tolerance: f64,
    /// Unit-price spread that triggers a cross-document price finding.
    pub price_variation_threshold: f64,
    /// Reconciliation: max distance between document total and the
    /// absolute transaction amount.
    pub amount_tolerance: f64,
    /// Reconciliation: date window, in days, either direction.
    pub date_window_days: i64,
    /// Rows kept in each structural summary sample.
    pub sample_row_limit: usize,
    /// Row cap for column profiling of very large files.
    pub max_profile_rows: usize,
    /// Lines inspected when sniffing tabular delimiters.
    pub sniff_preview_lines: usize,
    /// Archive entries larger than this are discarded unexpanded.
    pub max_archive_entry_bytes: u64,
    /// Cap on discarded-entry names kept in a summary.
    pub max_discarded_names: usize,
    /// Executable/script extensions rejected during archive expansion.
    pub blocked_extensions: Vec<String>,
    /// Names/identifiers of the auditing company; used by the
    /// operation-direction rule to recognize the buyer role.
    pub company_identifiers: Vec<String>,
    pub ocr_command: String,
    pub pdftoppm_command: String,
    pub ocr_languages: String,
    pub ocr_preprocessing: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            value_calc_relative_tolerance: 0.001,
            value_calc_absolute_tolerance: 0.01,
            icms_calc_tolerance: 0.015,
            price_variation_threshold: 0.15,
            amount_tolerance: 0.02,
            date_window_days: 30,
            sample_row_limit: 5,
            max_profile_rows: 1000,
            sniff_preview_lines: 20,
            max_archive_entry_bytes: 100_000_000,
            max_discarded_names: 20,
            blocked_extensions: [
                "js", "exe", "bat", "cmd", "sh", "dll", "msi", "ps1", "vbs", "scr",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            company_identifiers: Vec::new(),
            ocr_command: "tesseract".to_string(),
            pdftoppm_command: "pdftoppm".to_string(),
            ocr_languages: "por+eng".to_string(),
            ocr_preprocessing: true,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from defaults, `fiscaudit.toml` and the
    /// `FISCAUDIT_` environment prefix, in increasing precedence.
    pub fn load() -> Result<Self> {
        let config: PipelineConfig = Figment::from(Serialized::defaults(PipelineConfig::default()))
            .merge(Toml::file("fiscaudit.toml"))
            .merge(Env::prefixed("FISCAUDIT_"))
            .extract()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.value_calc_relative_tolerance < 0.0 || self.value_calc_absolute_tolerance < 0.0 {
            return Err(AppError::ValidationError(
                "value tolerances must be >= 0".to_string(),
            ));
        }
        if self.amount_tolerance < 0.0 {
            return Err(AppError::ValidationError(
                "amount_tolerance must be >= 0".to_string(),
            ));
        }
        if self.date_window_days < 0 {
            return Err(AppError::ValidationError(
                "date_window_days must be >= 0".to_string(),
            ));
        }
        if self.sample_row_limit == 0 {
            return Err(AppError::ValidationError(
                "sample_row_limit must be > 0".to_string(),
            ));
        }
        if self.sniff_preview_lines == 0 {
            return Err(AppError::ValidationError(
                "sniff_preview_lines must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn extension_blocked(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.blocked_extensions.iter().any(|b| b == &ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.extension_blocked("JS"));
        assert!(config.extension_blocked("exe"));
        assert!(!config.extension_blocked("xml"));
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let config = PipelineConfig {
            amount_tolerance: -0.01,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
