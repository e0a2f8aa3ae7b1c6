// ============================================================
// FISCAL RULES ENGINE
// ============================================================
// Pure function over one normalized item, returning zero or more
// findings from the fixed catalog.

use crate::application::use_cases::rules_catalog as rules;
use crate::domain::audit::Inconsistency;
use crate::domain::item::{fields, NormalizedItem};
use crate::infrastructure::config::PipelineConfig;

pub fn run_fiscal_validation(item: &NormalizedItem, config: &PipelineConfig) -> Vec<Inconsistency> {
    let mut findings = Vec::new();

    let cfop = item.text(fields::PRODUTO_CFOP).unwrap_or_default();
    let ncm = item.text(fields::PRODUTO_NCM).unwrap_or_default();
    let cst_icms = item.text(fields::PRODUTO_CST_ICMS);
    let cst_pis = item.text(fields::PRODUTO_CST_PIS);
    let cst_cofins = item.text(fields::PRODUTO_CST_COFINS);
    let quantity = item.number(fields::PRODUTO_QTD);
    let unit_price = item.number(fields::PRODUTO_VALOR_UNIT);
    let total = item.number(fields::PRODUTO_VALOR_TOTAL);

    // Rule 1: outbound CFOP but the recipient is the auditing company,
    // so this is actually a purchase.
    if cfop.starts_with('5') || cfop.starts_with('6') {
        if let Some(recipient) = item.text(fields::DESTINATARIO_NOME) {
            let recipient = recipient.to_lowercase();
            if config
                .company_identifiers
                .iter()
                .any(|identity| recipient.contains(&identity.to_lowercase()))
            {
                findings.push(rules::finding(rules::CFOP_SAIDA_EM_COMPRA));
            }
        }
    }

    // Rule 2: placeholder NCM on what looks like a physical good.
    if ncm == "00000000" {
        let name = item
            .text(fields::PRODUTO_NOME)
            .unwrap_or_default()
            .to_lowercase();
        if !name.contains("serviço") && !name.contains("servico") && !name.contains("consultoria") {
            findings.push(rules::finding(rules::NCM_SERVICO_PARA_PRODUTO));
        }
    }
    if !ncm.is_empty() && ncm != "00000000" && ncm.chars().count() != 8 {
        findings.push(rules::finding(rules::NCM_INVALIDO));
    }

    // Rule 3: declared total vs quantity x unit price, with a relative
    // plus absolute rounding tolerance.
    if quantity > 0.0 && unit_price > 0.0 && total > 0.0 {
        let calculated = quantity * unit_price;
        let difference = (calculated - total).abs();
        if difference > calculated * config.value_calc_relative_tolerance
            && difference > config.value_calc_absolute_tolerance
        {
            findings.push(rules::finding(rules::VALOR_CALCULO_DIVERGENTE));
        }
    }

    // Rule 4: zero-valued line with positive quantity.
    if total == 0.0 && quantity > 0.0 && item.get(fields::PRODUTO_VALOR_TOTAL).is_some() {
        findings.push(rules::finding(rules::VALOR_PROD_ZERO));
    }

    // Rules 5 & 6: interstate/intrastate CFOP vs origin/destination UF.
    let emit_uf = item
        .text(fields::EMITENTE_UF)
        .map(|uf| uf.to_uppercase());
    let dest_uf = item
        .text(fields::DESTINATARIO_UF)
        .map(|uf| uf.to_uppercase());
    if let (Some(emit_uf), Some(dest_uf)) = (emit_uf, dest_uf) {
        if !cfop.is_empty() {
            if cfop.starts_with('6') && emit_uf == dest_uf {
                findings.push(rules::finding(rules::CFOP_INTERESTADUAL_UF_INCOMPATIVEL));
            } else if cfop.starts_with('5') && emit_uf != dest_uf {
                findings.push(rules::finding(rules::CFOP_ESTADUAL_UF_INCOMPATIVEL));
            }
        }
    }

    let is_return_cfop = ["12", "22", "52", "62"]
        .iter()
        .any(|prefix| cfop.starts_with(prefix));

    // Rule 7: normally-taxed PIS/COFINS CST on a return operation.
    let pis_cofins_taxed =
        |cst: &Option<String>| matches!(cst.as_deref(), Some("01") | Some("02"));
    if is_return_cfop && (pis_cofins_taxed(&cst_pis) || pis_cofins_taxed(&cst_cofins)) {
        findings.push(rules::finding(rules::PIS_COFINS_CST_INVALIDO_PARA_DEVOLUCAO));
    }

    // Rule 8: normally-taxed ICMS CST on a return operation.
    let icms_taxed = matches!(cst_icms.as_deref(), Some("00") | Some("20"));
    if is_return_cfop && icms_taxed {
        findings.push(rules::finding(rules::ICMS_CST_INVALIDO_PARA_CFOP));
    }

    // Rule 9: declared ICMS vs base x rate, with a fixed absolute
    // tolerance for rounding.
    let icms_base = item.number(fields::PRODUTO_BASE_CALCULO_ICMS);
    let icms_rate = item.number(fields::PRODUTO_ALIQUOTA_ICMS);
    let icms_value = item.number(fields::PRODUTO_VALOR_ICMS);
    if icms_base > 0.0 && icms_rate > 0.0 && icms_value > 0.0 {
        let calculated = icms_base * (icms_rate / 100.0);
        if (calculated - icms_value).abs() > config.icms_calc_tolerance {
            findings.push(rules::finding(rules::ICMS_CALCULO_DIVERGENTE));
        }
    }

    findings
}
