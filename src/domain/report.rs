use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::audit::{AuditStatus, AuditedDocument, Severity};
use super::bank::ReconciliationResult;

/// Provenance of one side of a cross-document discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub value_a: String,
    pub doc_a: DocRef,
    pub value_b: String,
    pub doc_b: DocRef,
}

/// One attribute divergence found across documents sharing an item key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossValidationFinding {
    pub comparison_key: String,
    pub attribute: String,
    pub description: String,
    pub discrepancies: Vec<Discrepancy>,
    pub severity: Severity,
}

/// The boundary object consumed by external collaborators (UI, AI
/// summarizer). They only read this structure and never re-enter the
/// pipeline's algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub documents: Vec<AuditedDocument>,
    pub aggregated_metrics: BTreeMap<String, Value>,
    pub deterministic_cross_validation: Vec<CrossValidationFinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation_result: Option<ReconciliationResult>,
}

impl AuditReport {
    /// Size-bounded serialized sample handed to the AI-summarization
    /// collaborator: aggregated metrics plus a capped inconsistency
    /// digest, worst documents first.
    pub fn sample_for_summary(&self, max_findings: usize) -> Value {
        let mut digest: Vec<Value> = Vec::new();
        let mut docs: Vec<&AuditedDocument> = self.documents.iter().collect();
        docs.sort_by(|a, b| b.score.cmp(&a.score));
        'outer: for doc in docs {
            for inc in &doc.inconsistencies {
                if digest.len() >= max_findings {
                    break 'outer;
                }
                digest.push(serde_json::json!({
                    "document": doc.doc.name,
                    "code": inc.code,
                    "severity": inc.severity,
                    "message": inc.message,
                }));
            }
        }
        serde_json::json!({
            "aggregatedMetrics": self.aggregated_metrics,
            "documentCount": self.documents.len(),
            "errorCount": self
                .documents
                .iter()
                .filter(|d| d.status == AuditStatus::Erro)
                .count(),
            "inconsistencyDigest": digest,
            "crossValidationCount": self.deterministic_cross_validation.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{ImportStatus, ImportedDocument, Inconsistency, Severity};
    use crate::domain::file_entry::FileFormat;
    use crate::domain::summary::StructuralSummary;

    fn doc_with_findings(name: &str, score: u32, codes: &[&str]) -> AuditedDocument {
        AuditedDocument {
            doc: ImportedDocument {
                id: name.to_string(),
                kind: FileFormat::TabularText,
                name: name.to_string(),
                size: 0,
                status: ImportStatus::Parsed,
                items: vec![],
                text: None,
                error: None,
                summary: StructuralSummary::new(FileFormat::TabularText, 0, String::new()),
            },
            status: AuditStatus::Alerta,
            score,
            inconsistencies: codes
                .iter()
                .map(|c| Inconsistency {
                    code: c.to_string(),
                    message: String::new(),
                    explanation: String::new(),
                    normative_base: None,
                    severity: Severity::Alerta,
                })
                .collect(),
            classification: None,
            reconciliation_status: None,
        }
    }

    #[test]
    fn test_sample_caps_digest_and_prefers_worst_documents() {
        let report = AuditReport {
            documents: vec![
                doc_with_findings("leve.csv", 2, &["A"]),
                doc_with_findings("grave.csv", 20, &["B", "C", "D"]),
            ],
            aggregated_metrics: BTreeMap::new(),
            deterministic_cross_validation: vec![],
            reconciliation_result: None,
        };
        let sample = report.sample_for_summary(2);
        let digest = sample["inconsistencyDigest"].as_array().unwrap();
        assert_eq!(digest.len(), 2);
        assert_eq!(digest[0]["document"], "grave.csv");
    }
}
