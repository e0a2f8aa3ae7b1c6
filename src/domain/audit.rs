// ============================================================
// AUDIT DOMAIN TYPES
// ============================================================

use serde::{Deserialize, Serialize};

use super::file_entry::FileFormat;
use super::item::NormalizedItem;
use super::summary::StructuralSummary;

/// Materiality of a fiscal finding, ordered ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Alerta,
    Erro,
}

impl Severity {
    /// Weight used for the document's severity score.
    pub fn score_weight(&self) -> u32 {
        match self {
            Severity::Erro => 10,
            Severity::Alerta => 2,
            Severity::Info => 0,
        }
    }
}

/// Audit verdict for one document, derived from the worst finding present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    Ok,
    Alerta,
    Erro,
}

/// One rule violation from the fixed catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    /// Stable catalog code, e.g. `VALOR_CALCULO_DIVERGENTE`.
    pub code: String,
    pub message: String,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normative_base: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Compra,
    Venda,
    #[serde(rename = "Devolução")]
    Devolucao,
    #[serde(rename = "Serviço")]
    Servico,
    #[serde(rename = "Transferência")]
    Transferencia,
    Outros,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub operation_type: OperationType,
    pub business_sector: String,
    pub confidence: f64,
    pub cost_center: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Parsed,
    Error,
    Unsupported,
}

/// A source document after normalization: items, structural summary, and
/// whatever error stopped it from parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedDocument {
    pub id: String,
    pub kind: FileFormat,
    pub name: String,
    pub size: u64,
    pub status: ImportStatus,
    pub items: Vec<NormalizedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub summary: StructuralSummary,
}

impl ImportedDocument {
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReconciliationStatus {
    Conciliado,
    Pendente,
}

/// A document plus its audit verdict; enriched in place by the
/// classifier and the reconciliation matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditedDocument {
    pub doc: ImportedDocument,
    pub status: AuditStatus,
    pub score: u32,
    pub inconsistencies: Vec<Inconsistency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation_status: Option<ReconciliationStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Erro > Severity::Alerta);
        assert!(Severity::Alerta > Severity::Info);
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Erro).unwrap(), "\"ERRO\"");
        assert_eq!(
            serde_json::to_string(&Severity::Alerta).unwrap(),
            "\"ALERTA\""
        );
    }

    #[test]
    fn test_operation_type_accents() {
        assert_eq!(
            serde_json::to_string(&OperationType::Devolucao).unwrap(),
            "\"Devolução\""
        );
    }
}
