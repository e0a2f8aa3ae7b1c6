// ============================================================
// AUDITOR
// ============================================================
// Runs every item of every document through the rules engine,
// deduplicates findings by code, and derives the document status and
// severity-weighted score.

use crate::application::use_cases::rules_catalog as rules;
use crate::application::use_cases::rules_engine::run_fiscal_validation;
use crate::domain::audit::{
    AuditStatus, AuditedDocument, ImportStatus, ImportedDocument, Inconsistency, Severity,
};
use crate::infrastructure::config::PipelineConfig;
use crate::shared::log::PipelineLog;

/// Score assigned to documents that failed import altogether.
const IMPORT_FAILURE_SCORE: u32 = 99;

pub fn run_audit(
    documents: Vec<ImportedDocument>,
    config: &PipelineConfig,
    log: &PipelineLog,
) -> Vec<AuditedDocument> {
    log.add(
        "INFO",
        "auditor",
        &format!("Auditando {} documento(s)", documents.len()),
    );

    documents
        .into_iter()
        .map(|doc| audit_document(doc, config))
        .collect()
}

fn audit_document(doc: ImportedDocument, config: &PipelineConfig) -> AuditedDocument {
    if matches!(doc.status, ImportStatus::Error | ImportStatus::Unsupported) {
        let mut failure = rules::finding(rules::FALHA_IMPORTACAO);
        if let Some(error) = &doc.error {
            failure.message = error.clone();
        }
        failure.explanation = format!(
            "O arquivo \"{}\" não pôde ser lido corretamente. Verifique se o arquivo não está \
             corrompido e se o formato é um dos suportados.",
            doc.name
        );
        return AuditedDocument {
            doc,
            status: AuditStatus::Erro,
            score: IMPORT_FAILURE_SCORE,
            inconsistencies: vec![failure],
            classification: None,
            reconciliation_status: None,
        };
    }

    let mut all_findings: Vec<Inconsistency> = Vec::new();
    for item in &doc.items {
        all_findings.extend(run_fiscal_validation(item, config));
    }

    // At most one instance of a given code survives per document.
    let mut unique: Vec<Inconsistency> = Vec::new();
    for finding in all_findings {
        if !unique.iter().any(|existing| existing.code == finding.code) {
            unique.push(finding);
        }
    }

    let status = if unique.iter().any(|f| f.severity == Severity::Erro) {
        AuditStatus::Erro
    } else if unique.iter().any(|f| f.severity == Severity::Alerta) {
        AuditStatus::Alerta
    } else {
        AuditStatus::Ok
    };

    let score = unique.iter().map(|f| f.severity.score_weight()).sum();

    AuditedDocument {
        doc,
        status,
        score,
        inconsistencies: unique,
        classification: None,
        reconciliation_status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::file_entry::FileFormat;
    use crate::domain::item::{fields, NormalizedItem};
    use crate::domain::summary::StructuralSummary;

    fn imported(items: Vec<NormalizedItem>) -> ImportedDocument {
        ImportedDocument {
            id: "doc".to_string(),
            kind: FileFormat::TabularText,
            name: "doc.csv".to_string(),
            size: 0,
            status: ImportStatus::Parsed,
            items,
            text: None,
            error: None,
            summary: StructuralSummary::new(FileFormat::TabularText, 0, String::new()),
        }
    }

    fn divergent_item() -> NormalizedItem {
        let mut item = NormalizedItem::new();
        item.set_text(fields::PRODUTO_QTD, "2");
        item.set_text(fields::PRODUTO_VALOR_UNIT, "10.00");
        item.set_text(fields::PRODUTO_VALOR_TOTAL, "25.00");
        item
    }

    #[test]
    fn test_findings_are_deduplicated_by_code() {
        let doc = imported(vec![divergent_item(), divergent_item(), divergent_item()]);
        let audited = audit_document(doc, &PipelineConfig::default());
        assert_eq!(audited.inconsistencies.len(), 1);
        assert_eq!(audited.inconsistencies[0].code, "VALOR_CALCULO_DIVERGENTE");
    }

    #[test]
    fn test_status_is_worst_severity_and_score_is_weighted() {
        let mut alerta_item = NormalizedItem::new();
        alerta_item.set_text(fields::PRODUTO_QTD, "2");
        alerta_item.set_text(fields::PRODUTO_VALOR_TOTAL, "0");

        let doc = imported(vec![alerta_item.clone()]);
        let audited = audit_document(doc, &PipelineConfig::default());
        assert_eq!(audited.status, AuditStatus::Alerta);
        assert_eq!(audited.score, 2);

        let doc = imported(vec![alerta_item, divergent_item()]);
        let audited = audit_document(doc, &PipelineConfig::default());
        assert_eq!(audited.status, AuditStatus::Erro);
        assert_eq!(audited.score, 12);
    }

    #[test]
    fn test_clean_document_is_ok() {
        let doc = imported(vec![NormalizedItem::new()]);
        let audited = audit_document(doc, &PipelineConfig::default());
        assert_eq!(audited.status, AuditStatus::Ok);
        assert_eq!(audited.score, 0);
        assert!(audited.inconsistencies.is_empty());
    }

    #[test]
    fn test_import_failure_becomes_erro_with_high_score() {
        let mut doc = imported(vec![]);
        doc.status = ImportStatus::Error;
        doc.error = Some("Formato de arquivo não suportado.".to_string());
        let audited = audit_document(doc, &PipelineConfig::default());
        assert_eq!(audited.status, AuditStatus::Erro);
        assert_eq!(audited.score, 99);
        assert_eq!(audited.inconsistencies[0].code, "FALHA_IMPORTACAO");
        assert_eq!(
            audited.inconsistencies[0].message,
            "Formato de arquivo não suportado."
        );
    }
}
