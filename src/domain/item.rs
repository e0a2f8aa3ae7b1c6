// ============================================================
// NORMALIZED ITEM
// ============================================================
// One row of business data, shape-agnostic across source formats.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::shared::numeric::parse_flexible_number;

/// Canonical field names shared by every normalizer. The vocabulary
/// follows the NFe wire format so tabular uploads that already use these
/// headers flow through the rules engine untouched.
pub mod fields {
    pub const NFE_ID: &str = "nfe_id";
    pub const DATA_EMISSAO: &str = "data_emissao";
    pub const VALOR_TOTAL_NFE: &str = "valor_total_nfe";
    pub const EMITENTE_NOME: &str = "emitente_nome";
    pub const EMITENTE_CNPJ: &str = "emitente_cnpj";
    pub const EMITENTE_UF: &str = "emitente_uf";
    pub const DESTINATARIO_NOME: &str = "destinatario_nome";
    pub const DESTINATARIO_CNPJ: &str = "destinatario_cnpj";
    pub const DESTINATARIO_UF: &str = "destinatario_uf";
    pub const PRODUTO_NOME: &str = "produto_nome";
    pub const PRODUTO_NCM: &str = "produto_ncm";
    pub const PRODUTO_CFOP: &str = "produto_cfop";
    pub const PRODUTO_QTD: &str = "produto_qtd";
    pub const PRODUTO_VALOR_UNIT: &str = "produto_valor_unit";
    pub const PRODUTO_VALOR_TOTAL: &str = "produto_valor_total";
    pub const PRODUTO_BASE_CALCULO_ICMS: &str = "produto_base_calculo_icms";
    pub const PRODUTO_VALOR_ICMS: &str = "produto_valor_icms";
    pub const PRODUTO_ALIQUOTA_ICMS: &str = "produto_aliquota_icms";
    pub const PRODUTO_CST_ICMS: &str = "produto_cst_icms";
    pub const PRODUTO_VALOR_PIS: &str = "produto_valor_pis";
    pub const PRODUTO_ALIQUOTA_PIS: &str = "produto_aliquota_pis";
    pub const PRODUTO_CST_PIS: &str = "produto_cst_pis";
    pub const PRODUTO_VALOR_COFINS: &str = "produto_valor_cofins";
    pub const PRODUTO_ALIQUOTA_COFINS: &str = "produto_aliquota_cofins";
    pub const PRODUTO_CST_COFINS: &str = "produto_cst_cofins";
    pub const PRODUTO_VALOR_ISS: &str = "produto_valor_iss";
    /// Plain-text normalizer: 1-based line number.
    pub const LINHA: &str = "linha";
    /// Plain-text and fallback normalizers: raw content payload.
    pub const CONTEUDO: &str = "conteudo";
    /// Spreadsheet normalizer: source sheet name.
    pub const PLANILHA: &str = "planilha";
}

/// A mapping from canonical field names to values. Produced by a
/// normalizer, consumed by the rules engine and later stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedItem {
    pub fields: BTreeMap<String, Value>,
}

impl NormalizedItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder item for documents with zero extractable rows.
    pub fn placeholder(description: impl Into<String>) -> Self {
        let mut item = Self::new();
        item.set_text(fields::CONTEUDO, description);
        item
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), Value::String(value.into()));
    }

    /// Set a field only when the value is present and non-empty.
    pub fn set_opt(&mut self, key: &str, value: Option<String>) {
        if let Some(value) = value {
            if !value.trim().is_empty() {
                self.fields
                    .insert(key.to_string(), Value::String(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field value as trimmed text. Empty strings and JSON nulls read as
    /// absent, mirroring how the rules treat blank cells.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Field value as a number, tolerating comma- and dot-decimal
    /// conventions. Missing or unparseable values read as 0.
    pub fn number(&self, key: &str) -> f64 {
        match self.fields.get(key) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => parse_flexible_number(s).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_trims_and_skips_blank() {
        let mut item = NormalizedItem::new();
        item.set_text(fields::PRODUTO_CFOP, "  6101 ");
        item.set_text(fields::PRODUTO_NCM, "   ");
        assert_eq!(item.text(fields::PRODUTO_CFOP).as_deref(), Some("6101"));
        assert_eq!(item.text(fields::PRODUTO_NCM), None);
        assert_eq!(item.text("inexistente"), None);
    }

    #[test]
    fn test_number_accepts_both_decimal_conventions() {
        let mut item = NormalizedItem::new();
        item.set_text(fields::PRODUTO_VALOR_TOTAL, "1.234,56");
        item.set(fields::PRODUTO_QTD, Value::from(3.5));
        assert!((item.number(fields::PRODUTO_VALOR_TOTAL) - 1234.56).abs() < 1e-9);
        assert!((item.number(fields::PRODUTO_QTD) - 3.5).abs() < 1e-9);
        assert_eq!(item.number("inexistente"), 0.0);
    }

    #[test]
    fn test_set_opt_ignores_empty() {
        let mut item = NormalizedItem::new();
        item.set_opt(fields::EMITENTE_UF, Some("SP".to_string()));
        item.set_opt(fields::DESTINATARIO_UF, Some("  ".to_string()));
        item.set_opt(fields::EMITENTE_NOME, None);
        assert_eq!(item.text(fields::EMITENTE_UF).as_deref(), Some("SP"));
        assert!(item.get(fields::DESTINATARIO_UF).is_none());
        assert!(item.get(fields::EMITENTE_NOME).is_none());
    }
}
