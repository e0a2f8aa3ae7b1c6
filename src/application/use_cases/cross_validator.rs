// ============================================================
// CROSS-DOCUMENT VALIDATOR
// ============================================================
// Groups line items across the whole batch by case-normalized product
// name and flags classification-code and unit-price divergence.
// Quadratic only within a name group, never across the batch.

use std::collections::BTreeMap;

use crate::domain::audit::{AuditStatus, AuditedDocument, Severity};
use crate::domain::item::{fields, NormalizedItem};
use crate::domain::report::{CrossValidationFinding, Discrepancy, DocRef};
use crate::infrastructure::config::PipelineConfig;
use crate::shared::numeric::format_currency_brl;

struct SourcedItem<'a> {
    item: &'a NormalizedItem,
    source: DocRef,
}

pub fn run_cross_validation(
    documents: &[AuditedDocument],
    config: &PipelineConfig,
) -> Vec<CrossValidationFinding> {
    let mut findings = Vec::new();

    // Group items by case-normalized product name, keeping the original
    // spelling of the first occurrence for display.
    let mut groups: BTreeMap<String, (String, Vec<SourcedItem>)> = BTreeMap::new();
    for audited in documents {
        if audited.status == AuditStatus::Erro || audited.doc.items.is_empty() {
            continue;
        }
        for item in &audited.doc.items {
            let Some(name) = item.text(fields::PRODUTO_NOME) else {
                continue;
            };
            let key = name.to_lowercase();
            let entry = groups.entry(key).or_insert_with(|| (name.clone(), Vec::new()));
            entry.1.push(SourcedItem {
                item,
                source: DocRef {
                    name: audited.doc.name.clone(),
                    internal_path: audited.doc.summary.internal_path.clone(),
                },
            });
        }
    }

    for (_, (display_name, items)) in groups {
        if items.len() < 2 {
            continue;
        }

        // Classification-code divergence: one finding with one
        // discrepancy per extra code after the first observed.
        let mut ncm_values: BTreeMap<String, &SourcedItem> = BTreeMap::new();
        let mut ncm_order: Vec<String> = Vec::new();
        for sourced in &items {
            let ncm = sourced
                .item
                .text(fields::PRODUTO_NCM)
                .unwrap_or_else(|| "N/A".to_string());
            if !ncm_values.contains_key(&ncm) {
                ncm_order.push(ncm.clone());
                ncm_values.insert(ncm, sourced);
            }
        }
        if ncm_order.len() > 1 {
            let first_ncm = &ncm_order[0];
            let first_item = ncm_values[first_ncm];
            findings.push(CrossValidationFinding {
                comparison_key: display_name.clone(),
                attribute: "NCM".to_string(),
                description: format!(
                    "O produto \"{}\" foi encontrado com múltiplos códigos NCM ({}), o que pode \
                     levar a tributação inconsistente.",
                    display_name,
                    ncm_order.join(", ")
                ),
                discrepancies: ncm_order[1..]
                    .iter()
                    .map(|other| Discrepancy {
                        value_a: first_ncm.clone(),
                        doc_a: first_item.source.clone(),
                        value_b: other.clone(),
                        doc_b: ncm_values[other].source.clone(),
                    })
                    .collect(),
                severity: Severity::Alerta,
            });
        }

        // Unit-price spread between the two extremal documents.
        let mut min_priced: Option<(f64, &SourcedItem)> = None;
        let mut max_priced: Option<(f64, &SourcedItem)> = None;
        for sourced in &items {
            let price = sourced.item.number(fields::PRODUTO_VALOR_UNIT);
            if price <= 0.0 {
                continue;
            }
            if min_priced.map_or(true, |(min, _)| price < min) {
                min_priced = Some((price, sourced));
            }
            if max_priced.map_or(true, |(max, _)| price > max) {
                max_priced = Some((price, sourced));
            }
        }
        if let (Some((min_price, min_item)), Some((max_price, max_item))) =
            (min_priced, max_priced)
        {
            if min_price < max_price {
                let variation = (max_price - min_price) / min_price;
                if variation > config.price_variation_threshold {
                    findings.push(CrossValidationFinding {
                        comparison_key: display_name.clone(),
                        attribute: "Preço Unitário".to_string(),
                        description: format!(
                            "Variação de preço de {:.0}% detectada para o produto \"{}\".",
                            variation * 100.0,
                            display_name
                        ),
                        discrepancies: vec![Discrepancy {
                            value_a: format_currency_brl(min_price),
                            doc_a: min_item.source.clone(),
                            value_b: format_currency_brl(max_price),
                            doc_b: max_item.source.clone(),
                        }],
                        severity: Severity::Alerta,
                    });
                }
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{ImportStatus, ImportedDocument};
    use crate::domain::file_entry::FileFormat;
    use crate::domain::summary::StructuralSummary;

    fn doc_with_product(
        doc_name: &str,
        product: &str,
        ncm: &str,
        unit_price: &str,
    ) -> AuditedDocument {
        let mut item = NormalizedItem::new();
        item.set_text(fields::PRODUTO_NOME, product);
        if !ncm.is_empty() {
            item.set_text(fields::PRODUTO_NCM, ncm);
        }
        if !unit_price.is_empty() {
            item.set_text(fields::PRODUTO_VALOR_UNIT, unit_price);
        }
        AuditedDocument {
            doc: ImportedDocument {
                id: doc_name.to_string(),
                kind: FileFormat::Markup,
                name: doc_name.to_string(),
                size: 0,
                status: ImportStatus::Parsed,
                items: vec![item],
                text: None,
                error: None,
                summary: StructuralSummary::new(FileFormat::Markup, 0, String::new()),
            },
            status: AuditStatus::Ok,
            score: 0,
            inconsistencies: vec![],
            classification: None,
            reconciliation_status: None,
        }
    }

    #[test]
    fn test_price_spread_over_threshold_yields_exactly_one_finding() {
        // 100.00 vs 120.00: 20% spread, over the 15% threshold.
        let docs = vec![
            doc_with_product("a.xml", "Caneta Azul", "96081000", "100.00"),
            doc_with_product("b.xml", "Caneta Azul", "96081000", "120.00"),
        ];
        let findings = run_cross_validation(&docs, &PipelineConfig::default());
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.attribute, "Preço Unitário");
        assert_eq!(finding.discrepancies.len(), 1);
        assert_eq!(finding.discrepancies[0].doc_a.name, "a.xml");
        assert_eq!(finding.discrepancies[0].doc_b.name, "b.xml");
        assert_eq!(finding.discrepancies[0].value_a, "R$ 100,00");
        assert_eq!(finding.discrepancies[0].value_b, "R$ 120,00");
    }

    #[test]
    fn test_price_spread_under_threshold_is_clean() {
        let docs = vec![
            doc_with_product("a.xml", "Caneta", "96081000", "100.00"),
            doc_with_product("b.xml", "Caneta", "96081000", "110.00"),
        ];
        assert!(run_cross_validation(&docs, &PipelineConfig::default()).is_empty());
    }

    #[test]
    fn test_ncm_divergence_one_discrepancy_per_extra_code() {
        let docs = vec![
            doc_with_product("a.xml", "Caneta", "96081000", ""),
            doc_with_product("b.xml", "caneta", "96082000", ""),
            doc_with_product("c.xml", "CANETA", "96083000", ""),
        ];
        let findings = run_cross_validation(&docs, &PipelineConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].attribute, "NCM");
        assert_eq!(findings[0].discrepancies.len(), 2);
        assert_eq!(findings[0].severity, Severity::Alerta);
    }

    #[test]
    fn test_names_group_case_insensitively() {
        let docs = vec![
            doc_with_product("a.xml", "Caneta Azul", "1", "100.00"),
            doc_with_product("b.xml", "CANETA AZUL", "1", "150.00"),
        ];
        let findings = run_cross_validation(&docs, &PipelineConfig::default());
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_error_documents_do_not_participate() {
        let mut bad = doc_with_product("erro.xml", "Caneta", "1", "500.00");
        bad.status = AuditStatus::Erro;
        let docs = vec![doc_with_product("a.xml", "Caneta", "1", "100.00"), bad];
        assert!(run_cross_validation(&docs, &PipelineConfig::default()).is_empty());
    }

    #[test]
    fn test_singleton_groups_are_ignored() {
        let docs = vec![doc_with_product("a.xml", "Caneta", "1", "100.00")];
        assert!(run_cross_validation(&docs, &PipelineConfig::default()).is_empty());
    }
}
