// ============================================================
// AUDIT PIPELINE
// ============================================================
// Stage orchestration: import -> audit -> classify -> cross-validate
// -> aggregate. Reconciliation is a separate, user-triggered run. The
// caller always receives a complete report, even when every file fails.

use std::sync::Arc;

use super::accountant::run_accountant_analysis;
use super::auditor::run_audit;
use super::classifier::{run_classification, Corrections};
use super::cross_validator::run_cross_validation;
use super::import_pipeline::run_import;
use super::normalizers::{HeuristicExtractor, StructuredTextExtractor};
use super::reconciliation::{parse_bank_statements, run_reconciliation};
use crate::domain::file_entry::RawFileEntry;
use crate::domain::report::AuditReport;
use crate::infrastructure::config::PipelineConfig;
use crate::shared::log::PipelineLog;
use crate::shared::progress::{CancelFlag, ProgressSink};

pub struct AuditPipeline {
    config: Arc<PipelineConfig>,
    log: PipelineLog,
    extractor: Arc<dyn StructuredTextExtractor>,
}

impl AuditPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
            log: PipelineLog::new(),
            extractor: Arc::new(HeuristicExtractor),
        }
    }

    /// Swap in an external extraction collaborator for scanned
    /// documents (e.g. a generative-language backend).
    pub fn with_extractor(mut self, extractor: Arc<dyn StructuredTextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_log(mut self, log: PipelineLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &PipelineLog {
        &self.log
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full analysis over a batch of uploaded files.
    pub async fn run(
        &self,
        files: Vec<RawFileEntry>,
        corrections: &Corrections,
        progress: Option<ProgressSink>,
        cancel: CancelFlag,
    ) -> AuditReport {
        let imported = run_import(
            files,
            Arc::clone(&self.config),
            self.log.clone(),
            progress,
            cancel,
            Arc::clone(&self.extractor),
        )
        .await;

        let mut documents = run_audit(imported, &self.config, &self.log);

        run_classification(&mut documents, corrections);
        self.log.add("INFO", "pipeline", "Classificação concluída");

        let deterministic_cross_validation = run_cross_validation(&documents, &self.config);
        self.log.add(
            "INFO",
            "pipeline",
            &format!(
                "Validação cruzada: {} achado(s)",
                deterministic_cross_validation.len()
            ),
        );

        let aggregated_metrics = run_accountant_analysis(&documents);

        AuditReport {
            documents,
            aggregated_metrics,
            deterministic_cross_validation,
            reconciliation_result: None,
        }
    }

    /// Reconcile the report's documents against bank-statement files,
    /// attaching the result to the report.
    pub async fn reconcile(
        &self,
        report: &mut AuditReport,
        bank_files: Vec<RawFileEntry>,
        cancel: CancelFlag,
    ) {
        let transactions = parse_bank_statements(&bank_files, &self.config, &self.log);
        let result = run_reconciliation(
            report.documents.clone(),
            transactions,
            &self.config,
            &cancel,
        );

        // Propagate each document's reconciliation status back into the
        // report before storing the run.
        for document in report.documents.iter_mut() {
            if let Some(pair) = result
                .matched_pairs
                .iter()
                .find(|pair| pair.doc.doc.id == document.doc.id)
            {
                document.reconciliation_status = pair.doc.reconciliation_status;
            } else if let Some(unmatched) = result
                .unmatched_documents
                .iter()
                .find(|unmatched| unmatched.doc.id == document.doc.id)
            {
                document.reconciliation_status = unmatched.reconciliation_status;
            }
        }

        self.log.add(
            "INFO",
            "reconciliation",
            &format!(
                "Conciliação: {} par(es), {} documento(s) pendentes, {} transação(ões) sobrando",
                result.matched_pairs.len(),
                result.unmatched_documents.len(),
                result.unmatched_transactions.len()
            ),
        );
        report.reconciliation_result = Some(result);
    }
}

impl Default for AuditPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditStatus;

    fn csv_entry(name: &str, content: &str) -> RawFileEntry {
        RawFileEntry::new(name, content.as_bytes().to_vec(), None)
    }

    async fn run(files: Vec<RawFileEntry>) -> AuditReport {
        AuditPipeline::default()
            .run(files, &Corrections::default(), None, CancelFlag::new())
            .await
    }

    #[tokio::test]
    async fn test_interstate_cfop_with_same_uf_is_flagged_end_to_end() {
        // 6xxx implies interstate, but both parties share the region.
        let report = run(vec![csv_entry(
            "nota.csv",
            "produto_nome,produto_cfop,emitente_uf,destinatario_uf\n\
             Caneta,6101,SP,SP",
        )])
        .await;

        assert_eq!(report.documents.len(), 1);
        let doc = &report.documents[0];
        let codes: Vec<&str> = doc
            .inconsistencies
            .iter()
            .map(|i| i.code.as_str())
            .collect();
        assert!(codes.contains(&"CFOP_INTERESTADUAL_UF_INCOMPATIVEL"));
        assert!(!codes.contains(&"CFOP_ESTADUAL_UF_INCOMPATIVEL"));
        assert_eq!(doc.status, AuditStatus::Erro);
    }

    #[tokio::test]
    async fn test_cross_document_price_divergence_end_to_end() {
        // Same product at 100.00 and 120.00: 20% spread.
        let report = run(vec![
            csv_entry(
                "a.csv",
                "produto_nome,produto_valor_unit\nCaneta Azul,100.00",
            ),
            csv_entry(
                "b.csv",
                "produto_nome,produto_valor_unit\nCaneta Azul,120.00",
            ),
        ])
        .await;

        let price_findings: Vec<_> = report
            .deterministic_cross_validation
            .iter()
            .filter(|f| f.attribute == "Preço Unitário")
            .collect();
        assert_eq!(price_findings.len(), 1);
        let names: Vec<&str> = price_findings[0]
            .discrepancies
            .iter()
            .flat_map(|d| [d.doc_a.name.as_str(), d.doc_b.name.as_str()])
            .collect();
        assert!(names.contains(&"a.csv"));
        assert!(names.contains(&"b.csv"));
    }

    #[tokio::test]
    async fn test_reconciliation_attaches_result_and_statuses() {
        let mut report = run(vec![csv_entry(
            "nota.csv",
            "nfe_id,produto_nome,valor_total_nfe,data_emissao\n\
             N1,Caneta,500.00,2024-07-01",
        )])
        .await;

        let bank = csv_entry(
            "extrato.csv",
            "Date,Description,Amount\n2024-07-20,PGTO,-500.01",
        );
        AuditPipeline::default()
            .reconcile(&mut report, vec![bank], CancelFlag::new())
            .await;

        let result = report.reconciliation_result.as_ref().unwrap();
        assert_eq!(result.matched_pairs.len(), 1);
        assert_eq!(
            report.documents[0].reconciliation_status,
            Some(crate::domain::audit::ReconciliationStatus::Conciliado)
        );
    }

    #[tokio::test]
    async fn test_all_failing_batch_still_yields_full_report() {
        let report = run(vec![
            csv_entry("ruim.json", "{nope"),
            RawFileEntry::new("binario.xyz", vec![0u8, 1, 2], None),
        ])
        .await;
        assert_eq!(report.documents.len(), 2);
        assert!(report
            .documents
            .iter()
            .all(|d| d.status == AuditStatus::Erro));
        assert!(!report.aggregated_metrics.is_empty());
    }

    #[tokio::test]
    async fn test_summary_sample_is_bounded() {
        let report = run(vec![csv_entry(
            "nota.csv",
            "produto_nome,produto_qtd,produto_valor_unit,produto_valor_total\n\
             Caneta,10,1.50,99.00",
        )])
        .await;
        let sample = report.sample_for_summary(5);
        assert!(sample["inconsistencyDigest"].as_array().unwrap().len() <= 5);
    }
}
