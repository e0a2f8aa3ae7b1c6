// ============================================================
// ACCOUNTANT
// ============================================================
// Aggregates financial values across all non-error documents into the
// report's key metrics, formatted pt-BR.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::domain::audit::{AuditStatus, AuditedDocument};
use crate::domain::item::fields;
use crate::shared::numeric::format_currency_brl;

pub fn run_accountant_analysis(documents: &[AuditedDocument]) -> BTreeMap<String, Value> {
    let valid: Vec<&AuditedDocument> = documents
        .iter()
        .filter(|d| d.status != AuditStatus::Erro && !d.doc.items.is_empty())
        .collect();

    let mut metrics = BTreeMap::new();
    let all_items: Vec<_> = valid.iter().flat_map(|d| d.doc.items.iter()).collect();

    if all_items.is_empty() {
        metrics.insert(
            "Número de Documentos Válidos".to_string(),
            Value::from(0),
        );
        for key in [
            "Valor Total das NFes",
            "Valor Total dos Produtos",
            "Valor Total de ICMS",
            "Valor Total de PIS",
            "Valor Total de COFINS",
        ] {
            metrics.insert(key.to_string(), Value::from(format_currency_brl(0.0)));
        }
        return metrics;
    }

    // The NFe total repeats on every item of a document, so sum it once
    // per unique id.
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut total_nfe = 0.0f64;
    for item in &all_items {
        let id = item
            .text(fields::NFE_ID)
            .unwrap_or_else(|| "sem-id".to_string());
        if seen_ids.insert(id) {
            total_nfe += item.number(fields::VALOR_TOTAL_NFE);
        }
    }

    let sum = |field: &str| -> f64 { all_items.iter().map(|item| item.number(field)).sum() };

    metrics.insert(
        "Número de Documentos Válidos".to_string(),
        Value::from(seen_ids.len()),
    );
    metrics.insert(
        "Valor Total das NFes".to_string(),
        Value::from(format_currency_brl(total_nfe)),
    );
    metrics.insert(
        "Valor Total dos Produtos".to_string(),
        Value::from(format_currency_brl(sum(fields::PRODUTO_VALOR_TOTAL))),
    );
    metrics.insert(
        "Valor Total de ICMS".to_string(),
        Value::from(format_currency_brl(sum(fields::PRODUTO_VALOR_ICMS))),
    );
    metrics.insert(
        "Valor Total de PIS".to_string(),
        Value::from(format_currency_brl(sum(fields::PRODUTO_VALOR_PIS))),
    );
    metrics.insert(
        "Valor Total de COFINS".to_string(),
        Value::from(format_currency_brl(sum(fields::PRODUTO_VALOR_COFINS))),
    );
    metrics.insert(
        "Itens Processados".to_string(),
        Value::from(all_items.len()),
    );

    metrics
}
