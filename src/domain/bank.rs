use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::audit::AuditedDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// Normalized bank-statement line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    pub id: String,
    pub date: NaiveDate,
    /// Positive for credit, negative for debit.
    pub amount: f64,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub source_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPair {
    pub doc: AuditedDocument,
    pub transaction: BankTransaction,
}

/// Output of one reconciliation run. Documents and transactions removed
/// from the available pools are never reconsidered within the same run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub matched_pairs: Vec<MatchedPair>,
    pub unmatched_documents: Vec<AuditedDocument>,
    pub unmatched_transactions: Vec<BankTransaction>,
}
