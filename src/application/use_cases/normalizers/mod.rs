// ============================================================
// FORMAT-SPECIFIC NORMALIZERS
// ============================================================
// One per detected format. Each converts raw content into the uniform
// row model plus a structural diagnostic summary, then hands the rows
// to the column profiler before finalizing.

mod markup;
mod plain;
mod scanned;
mod spreadsheet;
mod structured;
mod tabular;

pub use markup::normalize_markup;
pub use plain::normalize_plain;
pub use scanned::{normalize_scanned, HeuristicExtractor, StructuredTextExtractor};
pub use spreadsheet::normalize_spreadsheet;
pub use structured::normalize_structured;
pub use tabular::normalize_tabular;

use sha2::{Digest, Sha256};

use crate::application::use_cases::column_profiler::profile_columns;
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::NormalizedItem;
use crate::domain::summary::StructuralSummary;
use crate::infrastructure::config::PipelineConfig;
use crate::shared::language::infer_language;

/// What every normalizer produces.
pub struct Normalized {
    pub summary: StructuralSummary,
    pub items: Vec<NormalizedItem>,
    pub text: Option<String>,
}

/// Summary skeleton shared by all normalizers: format tag, checksum and
/// archive provenance.
pub(crate) fn base_summary(
    entry: &RawFileEntry,
    format: FileFormat,
    mime: Option<String>,
) -> StructuralSummary {
    let checksum = hex::encode(Sha256::digest(&entry.bytes));
    let mut summary = StructuralSummary::new(format, entry.size(), checksum);
    summary.mime_type = mime;
    summary.parent_archive = entry.parent_archive.clone();
    summary.internal_path = entry.internal_path.clone();
    summary
}

/// Shared tail of every normalizer: column bookkeeping, row sample,
/// language guess, profiling, and the zero-item placeholder.
pub(crate) fn finalize(
    summary: &mut StructuralSummary,
    items: &mut Vec<NormalizedItem>,
    columns: Vec<String>,
    config: &PipelineConfig,
) {
    if items.is_empty() {
        items.push(NormalizedItem::placeholder(
            "Documento sem itens extraíveis",
        ));
    }

    summary.row_count = Some(items.len());
    summary.column_count = Some(columns.len());

    let sample_values: Vec<String> = items
        .iter()
        .take(50)
        .flat_map(|item| {
            columns
                .iter()
                .filter_map(|column| item.text(column))
                .collect::<Vec<_>>()
        })
        .collect();
    let (language, locale) = infer_language(&sample_values);
    summary.language = Some(language);
    summary.locale = Some(locale);

    summary.sample_rows = items.iter().take(config.sample_row_limit).cloned().collect();

    let outcome = profile_columns(&columns, items, config);
    summary.column_profiles = outcome.profiles;
    for issue in outcome.issues {
        summary.push_structural_issue(issue);
    }

    summary.columns = Some(columns);
}

/// Union of item keys in first-seen order; used by the normalizers whose
/// column set is not declared up front.
pub(crate) fn union_columns(items: &[NormalizedItem]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for item in items {
        for key in item.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}
