// ============================================================
// CLASSIFIER
// ============================================================
// Heuristic classification of each document's operation type from the
// CFOP codes of its items, plus an NCM-prefix sector lookup. User
// corrections always win.

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

use crate::domain::audit::{
    AuditStatus, AuditedDocument, ClassificationResult, OperationType,
};
use crate::domain::item::fields;

/// User-provided overrides, keyed by document name.
#[derive(Debug, Clone, Default)]
pub struct Corrections {
    pub classification: BTreeMap<String, OperationType>,
    pub cost_center: BTreeMap<String, String>,
}

static NCM_SECTOR_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("84", "Máquinas e Equipamentos"),
        ("85", "Material Elétrico"),
        ("8471", "Tecnologia da Informação"),
        ("22", "Bebidas"),
        ("10", "Produtos de Moagem"),
        ("2106", "Preparações Alimentícias Diversas"),
        ("96", "Manufaturas Diversas"),
        ("48", "Papel e Celulose"),
    ])
});

fn business_sector(ncm: &str) -> &'static str {
    if ncm.len() < 2 || !ncm.is_ascii() {
        return "Não Classificado";
    }
    let prefix4 = &ncm[..ncm.len().min(4)];
    let prefix2 = &ncm[..2];
    NCM_SECTOR_MAP
        .get(prefix4)
        .or_else(|| NCM_SECTOR_MAP.get(prefix2))
        .copied()
        .unwrap_or("Comércio Varejista/Atacadista")
}

fn operation_for_cfop(cfop: &str) -> OperationType {
    if cfop.starts_with('1') || cfop.starts_with('2') {
        if cfop.starts_with("12") || cfop.starts_with("22") {
            OperationType::Devolucao
        } else if cfop.starts_with("13") || cfop.starts_with("23") {
            OperationType::Servico
        } else if cfop.starts_with("155") || cfop.starts_with("255") {
            OperationType::Transferencia
        } else {
            OperationType::Compra
        }
    } else if cfop.starts_with('5') || cfop.starts_with('6') {
        if cfop.starts_with("52") || cfop.starts_with("62") {
            OperationType::Devolucao
        } else if cfop.starts_with("5933") || cfop.starts_with("6933") {
            OperationType::Servico
        } else if cfop.starts_with("555") || cfop.starts_with("655") {
            OperationType::Transferencia
        } else {
            OperationType::Venda
        }
    } else {
        OperationType::Outros
    }
}

/// Enrich each audited document, in place, with its classification.
pub fn run_classification(documents: &mut [AuditedDocument], corrections: &Corrections) {
    for audited in documents.iter_mut() {
        if audited.status == AuditStatus::Erro || audited.doc.items.is_empty() {
            continue;
        }

        let mut counts: HashMap<OperationType, usize> = HashMap::new();
        let mut sector_scores: HashMap<&'static str, usize> = HashMap::new();
        let mut total_items = 0usize;

        for item in &audited.doc.items {
            if let Some(cfop) = item.text(fields::PRODUTO_CFOP) {
                total_items += 1;
                *counts.entry(operation_for_cfop(&cfop)).or_default() += 1;
            }
            if let Some(ncm) = item.text(fields::PRODUTO_NCM) {
                *sector_scores.entry(business_sector(&ncm)).or_default() += 1;
            }
        }

        if total_items == 0 {
            continue;
        }

        // Fixed candidate order keeps ties deterministic.
        let (primary_type, primary_count) = [
            OperationType::Compra,
            OperationType::Venda,
            OperationType::Devolucao,
            OperationType::Servico,
            OperationType::Transferencia,
            OperationType::Outros,
        ]
        .iter()
        .map(|op| (*op, counts.get(op).copied().unwrap_or(0)))
        .min_by_key(|(_, count)| std::cmp::Reverse(*count))
        .expect("non-empty candidates");

        let mut sectors: Vec<(&'static str, usize)> = sector_scores.into_iter().collect();
        sectors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let primary_sector = sectors
            .first()
            .map(|(sector, _)| *sector)
            .unwrap_or("Não Classificado");

        let mut classification = ClassificationResult {
            operation_type: primary_type,
            business_sector: primary_sector.to_string(),
            confidence: primary_count as f64 / total_items as f64,
            cost_center: "Não Alocado".to_string(),
        };

        if let Some(correction) = corrections.classification.get(&audited.doc.name) {
            classification.operation_type = *correction;
            classification.confidence = 1.0;
        }
        if let Some(cost_center) = corrections.cost_center.get(&audited.doc.name) {
            classification.cost_center = cost_center.clone();
        }

        audited.classification = Some(classification);
    }
}
