// ============================================================
// FISCAL RULES CATALOG
// ============================================================
// Static table keyed by stable code. Rule functions select codes from
// here and never construct ad-hoc messages.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::domain::audit::{Inconsistency, Severity};

pub const CFOP_SAIDA_EM_COMPRA: &str = "CFOP_SAIDA_EM_COMPRA";
pub const NCM_SERVICO_PARA_PRODUTO: &str = "NCM_SERVICO_PARA_PRODUTO";
pub const NCM_INVALIDO: &str = "NCM_INVALIDO";
pub const VALOR_CALCULO_DIVERGENTE: &str = "VALOR_CALCULO_DIVERGENTE";
pub const VALOR_PROD_ZERO: &str = "VALOR_PROD_ZERO";
pub const CFOP_INTERESTADUAL_UF_INCOMPATIVEL: &str = "CFOP_INTERESTADUAL_UF_INCOMPATIVEL";
pub const CFOP_ESTADUAL_UF_INCOMPATIVEL: &str = "CFOP_ESTADUAL_UF_INCOMPATIVEL";
pub const PIS_COFINS_CST_INVALIDO_PARA_DEVOLUCAO: &str = "PIS_COFINS_CST_INVALIDO_PARA_DEVOLUCAO";
pub const ICMS_CST_INVALIDO_PARA_CFOP: &str = "ICMS_CST_INVALIDO_PARA_CFOP";
pub const ICMS_CALCULO_DIVERGENTE: &str = "ICMS_CALCULO_DIVERGENTE";
pub const FALHA_IMPORTACAO: &str = "FALHA_IMPORTACAO";

static CATALOG: Lazy<BTreeMap<&'static str, Inconsistency>> = Lazy::new(|| {
    let mut catalog = BTreeMap::new();

    let mut insert = |code: &'static str,
                      severity: Severity,
                      message: &str,
                      explanation: &str,
                      normative_base: Option<&str>| {
        catalog.insert(
            code,
            Inconsistency {
                code: code.to_string(),
                message: message.to_string(),
                explanation: explanation.to_string(),
                normative_base: normative_base.map(|n| n.to_string()),
                severity,
            },
        );
    };

    insert(
        CFOP_SAIDA_EM_COMPRA,
        Severity::Erro,
        "CFOP de saída (5xxx/6xxx) em operação de compra.",
        "O CFOP indica uma Venda/Remessa, mas a empresa é a destinatária. Para compras, o CFOP \
         deveria ser de entrada (1xxx/2xxx). Isso pode indicar erro de digitação ou fraude fiscal.",
        Some("Anexo II do Convênio S/Nº, de 15 de dezembro de 1970."),
    );
    insert(
        NCM_SERVICO_PARA_PRODUTO,
        Severity::Alerta,
        "NCM \"00000000\" usado para um item que parece ser um produto.",
        "O NCM \"00000000\" é reservado para serviços ou itens sem classificação. Se o item é um \
         bem físico, ele deve ter um código NCM específico da tabela TIPI. A classificação \
         incorreta afeta a tributação de IPI e ICMS.",
        Some("Tabela de Incidência do IPI (TIPI), aprovada pelo Decreto nº 11.158/2022."),
    );
    insert(
        NCM_INVALIDO,
        Severity::Erro,
        "Código NCM possui formato inválido.",
        "O NCM deve ser um código de 8 dígitos. Um formato incorreto pode indicar erro de cadastro \
         e levar à rejeição da NFe ou a uma tributação errada.",
        Some("Sistema Harmonizado de Designação e de Codificação de Mercadorias."),
    );
    insert(
        VALOR_CALCULO_DIVERGENTE,
        Severity::Erro,
        "Valor total do item (vProd) não corresponde a Qtd x Vlr. Unit.",
        "A multiplicação da quantidade pelo valor unitário diverge do valor total do produto. Isso \
         pode indicar erros de arredondamento, descontos não informados ou manipulação de valores.",
        Some("Princípios contábeis e Art. 476 do Código Civil."),
    );
    insert(
        VALOR_PROD_ZERO,
        Severity::Alerta,
        "Produto com valor total zerado.",
        "O valor total do produto é zero. Isso pode ser uma bonificação, doação ou amostra, que \
         exige um CFOP específico (e.g., 5910/6910) e pode ter tratamento tributário diferenciado.",
        Some("RICMS (Regulamento do ICMS) do respectivo estado para operações de bonificação."),
    );
    insert(
        CFOP_INTERESTADUAL_UF_INCOMPATIVEL,
        Severity::Erro,
        "CFOP interestadual (6xxx) usado em operação com mesma UF de origem e destino.",
        "Um CFOP iniciado com 6 indica uma operação interestadual (entre estados diferentes). No \
         entanto, a UF do emitente e do destinatário são as mesmas. Isso pode indicar um erro de \
         digitação no CFOP ou nos endereços.",
        Some("Anexo II do Convênio S/Nº, de 15 de dezembro de 1970."),
    );
    insert(
        CFOP_ESTADUAL_UF_INCOMPATIVEL,
        Severity::Erro,
        "CFOP estadual (5xxx) usado em operação com UFs de origem e destino diferentes.",
        "Um CFOP iniciado com 5 indica uma operação estadual (dentro do mesmo estado). No entanto, \
         a UF do emitente e do destinatário são diferentes. O CFOP correto para esta operação \
         provavelmente deveria começar com 6.",
        Some("Anexo II do Convênio S/Nº, de 15 de dezembro de 1970."),
    );
    insert(
        PIS_COFINS_CST_INVALIDO_PARA_DEVOLUCAO,
        Severity::Alerta,
        "CST de PIS/COFINS (tributado) em CFOP de devolução.",
        "Operações de devolução (CFOPs 12xx, 22xx, 52xx, 62xx) geralmente devem ter um CST de \
         PIS/COFINS específico, como \"98 - Outras Operações de Saída\". Um CST de tributação \
         normal (ex: 01) está provavelmente incorreto.",
        Some("Lei 10.833/03 (COFINS) e Lei 10.637/02 (PIS)."),
    );
    insert(
        ICMS_CST_INVALIDO_PARA_CFOP,
        Severity::Alerta,
        "CST de ICMS incompatível com o CFOP da operação.",
        "O CST do ICMS indica um tipo de tributação (ex: \"00 - Tributada integralmente\") que não \
         é compatível com o CFOP de devolução (1.202), que deveria ter um CST não-tributado ou de \
         substituição tributária, por exemplo.",
        Some("Anexo I (Códigos de Situação Tributária) do Convênio S/Nº, de 1970."),
    );
    insert(
        ICMS_CALCULO_DIVERGENTE,
        Severity::Erro,
        "Valor do ICMS (vICMS) não corresponde ao cálculo (vBC x pICMS).",
        "O valor do ICMS informado no item diverge do cálculo da Base de Cálculo (vBC) pela \
         Alíquota (pICMS). Isso pode indicar erros de cálculo, arredondamento incorreto ou \
         manipulação fiscal.",
        Some("Lei Complementar nº 87/1996 (Lei Kandir)."),
    );
    insert(
        FALHA_IMPORTACAO,
        Severity::Erro,
        "Falha na importação ou formato não suportado.",
        "O arquivo não pôde ser lido corretamente. Verifique se o arquivo não está corrompido e se \
         o formato é um dos suportados.",
        None,
    );

    catalog
});

/// Clone the catalog template for a code. Panics only on a programming
/// error (unknown code), never on user input.
pub fn finding(code: &str) -> Inconsistency {
    CATALOG
        .get(code)
        .cloned()
        .unwrap_or_else(|| panic!("unknown rule code: {}", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_codes_match_keys() {
        for (code, template) in CATALOG.iter() {
            assert_eq!(*code, template.code);
        }
    }

    #[test]
    fn test_expected_severities() {
        assert_eq!(finding(VALOR_CALCULO_DIVERGENTE).severity, Severity::Erro);
        assert_eq!(finding(VALOR_PROD_ZERO).severity, Severity::Alerta);
        assert_eq!(finding(NCM_SERVICO_PARA_PRODUTO).severity, Severity::Alerta);
        assert_eq!(
            finding(CFOP_INTERESTADUAL_UF_INCOMPATIVEL).severity,
            Severity::Erro
        );
    }
}
