// ============================================================
// RECONCILIATION MATCHER
// ============================================================
// Pairs audited documents against bank transactions by amount
// tolerance and date window. Greedy, document-major, first-fit: simple
// and deterministic rather than globally optimal.

use chrono::NaiveDate;

use crate::domain::audit::{AuditStatus, AuditedDocument, ReconciliationStatus};
use crate::domain::bank::{BankTransaction, MatchedPair, ReconciliationResult, TransactionKind};
use crate::domain::file_entry::RawFileEntry;
use crate::domain::item::fields;
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::encoding::decode_bytes;
use crate::infrastructure::tabular::{parse_table, sniff_dialect};
use crate::shared::log::PipelineLog;
use crate::shared::numeric::parse_flexible_number;
use crate::shared::CancelFlag;

const DATE_HEADERS: &[&str] = &["date", "data"];
const DESCRIPTION_HEADERS: &[&str] = &["description", "descrição", "descricao"];
const AMOUNT_HEADERS: &[&str] = &["amount", "valor"];

/// Parse bank statements with the same tabular conventions as the
/// ingestion pipeline. Rows whose amount fails numeric parsing are
/// silently skipped.
pub fn parse_bank_statements(
    files: &[RawFileEntry],
    config: &PipelineConfig,
    log: &PipelineLog,
) -> Vec<BankTransaction> {
    let mut transactions = Vec::new();

    for file in files {
        let decoded = decode_bytes(&file.bytes, &[]);
        let dialect = sniff_dialect(&decoded.text, config.sniff_preview_lines);
        let table = match parse_table(&decoded.text, dialect) {
            Ok(table) => table,
            Err(e) => {
                log.add(
                    "WARN",
                    "reconciliation",
                    &format!("Extrato {} ilegível: {}", file.name, e),
                );
                continue;
            }
        };

        let date_idx = find_header(&table.headers, DATE_HEADERS);
        let description_idx = find_header(&table.headers, DESCRIPTION_HEADERS);
        let amount_idx = find_header(&table.headers, AMOUNT_HEADERS);
        let (Some(date_idx), Some(amount_idx)) = (date_idx, amount_idx) else {
            log.add(
                "WARN",
                "reconciliation",
                &format!(
                    "Extrato {} sem colunas de data/valor reconhecíveis",
                    file.name
                ),
            );
            continue;
        };

        for (row_index, row) in table.rows.iter().enumerate() {
            let Some(amount) = row.get(amount_idx).and_then(|v| parse_flexible_number(v)) else {
                continue;
            };
            let Some(date) = row.get(date_idx).and_then(|v| parse_date(v)) else {
                continue;
            };
            let description = description_idx
                .and_then(|idx| row.get(idx))
                .cloned()
                .unwrap_or_default();

            transactions.push(BankTransaction {
                id: format!("{}-{}", file.name, row_index),
                date,
                amount,
                description,
                kind: if amount >= 0.0 {
                    TransactionKind::Credit
                } else {
                    TransactionKind::Debit
                },
                source_file: file.name.clone(),
            });
        }
    }

    log.add(
        "INFO",
        "reconciliation",
        &format!("{} transação(ões) bancária(s) importadas", transactions.len()),
    );
    transactions
}

/// Case- and language-insensitive header lookup.
fn find_header(headers: &[String], candidates: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let normalized = header.trim().to_lowercase();
        candidates.iter().any(|c| normalized == *c)
    })
}

/// Accepts ISO dates (with or without a time part) and DD/MM/YYYY.
pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        return Some(date);
    }
    if let Some(head) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(head, "%Y-%m-%d") {
            return Some(date);
        }
    }
    None
}

/// Greedy document-major matching. The two pools are only mutated after
/// a match is fully committed, so an abort between iterations leaves
/// them consistent.
pub fn run_reconciliation(
    documents: Vec<AuditedDocument>,
    transactions: Vec<BankTransaction>,
    config: &PipelineConfig,
    cancel: &CancelFlag,
) -> ReconciliationResult {
    let mut pending: Vec<AuditedDocument> = documents
        .into_iter()
        .filter(|d| d.status != AuditStatus::Erro && !d.doc.items.is_empty())
        .collect();
    let mut available = transactions;
    let mut matched_pairs: Vec<MatchedPair> = Vec::new();

    // Iterate from the most-recently-pending document backward so
    // removals never shift unvisited indices.
    let mut index = pending.len();
    while index > 0 {
        index -= 1;
        if cancel.is_cancelled() {
            break;
        }

        let doc_total = pending[index]
            .doc
            .items
            .first()
            .map(|item| item.number(fields::VALOR_TOTAL_NFE))
            .unwrap_or(0.0);
        let doc_date = pending[index]
            .doc
            .items
            .first()
            .and_then(|item| item.text(fields::DATA_EMISSAO))
            .and_then(|raw| parse_date(&raw));

        let (Some(doc_date), true) = (doc_date, doc_total != 0.0) else {
            continue;
        };

        let matched = available.iter().position(|transaction| {
            let amount_match =
                (doc_total - transaction.amount.abs()).abs() <= config.amount_tolerance;
            let date_match =
                (doc_date - transaction.date).num_days().abs() <= config.date_window_days;
            amount_match && date_match
        });

        if let Some(tx_index) = matched {
            let transaction = available.remove(tx_index);
            let mut doc = pending.remove(index);
            doc.reconciliation_status = Some(ReconciliationStatus::Conciliado);
            matched_pairs.push(MatchedPair { doc, transaction });
        }
    }

    for doc in pending.iter_mut() {
        doc.reconciliation_status = Some(ReconciliationStatus::Pendente);
    }

    ReconciliationResult {
        matched_pairs,
        unmatched_documents: pending,
        unmatched_transactions: available,
    }
}
