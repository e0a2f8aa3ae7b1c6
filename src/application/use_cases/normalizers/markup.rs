// ============================================================
// MARKUP NORMALIZER
// ============================================================
// Parses XML into a generic node tree. Trees matching the fiscal
// document shape (infNFe / emit / dest / det) yield one item per line
// item with header fields repeated; anything else is kept as a single
// opaque item.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use uuid::Uuid;

use super::{base_summary, finalize, union_columns, Normalized};
use crate::domain::error::{AppError, Result};
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::{fields, NormalizedItem};
use crate::domain::summary::{EncodingDiagnosis, IssueSeverity};
use crate::infrastructure::config::PipelineConfig;
use crate::shared::log::PipelineLog;

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
    text: String,
}

impl XmlNode {
    /// Depth-first search for the first descendant with this local name.
    fn find(&self, name: &str) -> Option<&XmlNode> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    fn find_all<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.find_all(name, out);
        }
    }

    /// Trimmed text of the first descendant with this name.
    fn text_of(&self, name: &str) -> Option<String> {
        self.find(name).map(|node| node.text.trim().to_string())
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_tree(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = XmlNode {
        name: "#document".to_string(),
        ..Default::default()
    };
    let mut stack: Vec<XmlNode> = vec![root];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let mut node = XmlNode {
                    name: String::from_utf8_lossy(start.local_name().as_ref()).to_string(),
                    ..Default::default()
                };
                for attr in start.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
                    let value = attr
                        .unescape_value()
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    node.attrs.push((key, value));
                }
                stack.push(node);
            }
            Ok(Event::Empty(start)) => {
                let mut node = XmlNode {
                    name: String::from_utf8_lossy(start.local_name().as_ref()).to_string(),
                    ..Default::default()
                };
                for attr in start.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
                    let value = attr
                        .unescape_value()
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    node.attrs.push((key, value));
                }
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Ok(Event::Text(text)) => {
                let unescaped = text.unescape().map(|t| t.to_string()).unwrap_or_default();
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    let node = stack.pop().expect("non-empty stack");
                    stack.last_mut().expect("parent on stack").children.push(node);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::ParseError(format!("Malformed XML: {}", e)));
            }
        }
    }

    root = stack.into_iter().next().expect("document root");
    Ok(root)
}

/// True when the tree carries the known fiscal root/header/line-item
/// structure.
fn is_fiscal_shape(tree: &XmlNode) -> bool {
    tree.find("infNFe").is_some() || (tree.find("emit").is_some() && tree.find("det").is_some())
}

fn extract_header(tree: &XmlNode) -> NormalizedItem {
    let inf = tree.find("infNFe").unwrap_or(tree);

    let nfe_id = inf
        .attr("Id")
        .map(|id| id.trim_start_matches("NFe").to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("xml-{}", Uuid::new_v4()));

    let mut header = NormalizedItem::new();
    header.set_text(fields::NFE_ID, nfe_id);
    header.set_opt(
        fields::DATA_EMISSAO,
        inf.text_of("dhEmi").or_else(|| inf.text_of("dEmi")),
    );

    // The NFe total lives under total/ICMSTot; guard against picking a
    // per-item tag of the same name elsewhere.
    let total = inf.find("ICMSTot").and_then(|tot| tot.text_of("vNF"));
    header.set_opt(fields::VALOR_TOTAL_NFE, total.or_else(|| inf.text_of("vNF")));

    if let Some(emit) = inf.find("emit") {
        header.set_opt(fields::EMITENTE_NOME, emit.text_of("xNome"));
        header.set_opt(fields::EMITENTE_CNPJ, emit.text_of("CNPJ"));
        header.set_opt(fields::EMITENTE_UF, emit.text_of("UF"));
    }
    if let Some(dest) = inf.find("dest") {
        header.set_opt(fields::DESTINATARIO_NOME, dest.text_of("xNome"));
        header.set_opt(fields::DESTINATARIO_CNPJ, dest.text_of("CNPJ"));
        header.set_opt(fields::DESTINATARIO_UF, dest.text_of("UF"));
    }
    header
}

fn extract_items(tree: &XmlNode) -> Vec<NormalizedItem> {
    let header = extract_header(tree);
    let mut dets: Vec<&XmlNode> = Vec::new();
    tree.find_all("det", &mut dets);

    if dets.is_empty() {
        let mut item = header;
        item.set_text(fields::PRODUTO_NOME, "Nota sem itens detalhados");
        return vec![item];
    }

    dets.iter()
        .map(|det| {
            let mut item = header.clone();
            if let Some(prod) = det.find("prod") {
                item.set_opt(fields::PRODUTO_NOME, prod.text_of("xProd"));
                item.set_opt(fields::PRODUTO_NCM, prod.text_of("NCM"));
                item.set_opt(fields::PRODUTO_CFOP, prod.text_of("CFOP"));
                item.set_opt(fields::PRODUTO_QTD, prod.text_of("qCom"));
                item.set_opt(fields::PRODUTO_VALOR_UNIT, prod.text_of("vUnCom"));
                item.set_opt(fields::PRODUTO_VALOR_TOTAL, prod.text_of("vProd"));
            }
            if let Some(imposto) = det.find("imposto") {
                if let Some(icms) = imposto.find("ICMS") {
                    item.set_opt(fields::PRODUTO_BASE_CALCULO_ICMS, icms.text_of("vBC"));
                    item.set_opt(fields::PRODUTO_VALOR_ICMS, icms.text_of("vICMS"));
                    item.set_opt(fields::PRODUTO_ALIQUOTA_ICMS, icms.text_of("pICMS"));
                    item.set_opt(fields::PRODUTO_CST_ICMS, icms.text_of("CST"));
                }
                if let Some(pis) = imposto.find("PIS") {
                    item.set_opt(fields::PRODUTO_VALOR_PIS, pis.text_of("vPIS"));
                    item.set_opt(fields::PRODUTO_ALIQUOTA_PIS, pis.text_of("pPIS"));
                    item.set_opt(fields::PRODUTO_CST_PIS, pis.text_of("CST"));
                }
                if let Some(cofins) = imposto.find("COFINS") {
                    item.set_opt(fields::PRODUTO_VALOR_COFINS, cofins.text_of("vCOFINS"));
                    item.set_opt(fields::PRODUTO_ALIQUOTA_COFINS, cofins.text_of("pCOFINS"));
                    item.set_opt(fields::PRODUTO_CST_COFINS, cofins.text_of("CST"));
                }
                if let Some(issqn) = imposto.find("ISSQN") {
                    item.set_opt(fields::PRODUTO_VALOR_ISS, issqn.text_of("vISSQN"));
                }
            }
            item
        })
        .collect()
}

pub fn normalize_markup(
    entry: &RawFileEntry,
    text: &str,
    diagnosis: EncodingDiagnosis,
    mime: Option<String>,
    config: &PipelineConfig,
    log: &PipelineLog,
) -> Result<Normalized> {
    let mut summary = base_summary(entry, FileFormat::Markup, mime);
    summary.encoding = Some(diagnosis);

    let tree = parse_tree(text)?;

    let mut items = if is_fiscal_shape(&tree) {
        summary.log("Estrutura de documento fiscal reconhecida");
        extract_items(&tree)
    } else {
        log.add(
            "INFO",
            "markup",
            &format!("{}: XML genérico, mantendo documento opaco", entry.name),
        );
        summary.push_issue(
            "MARKUP_FALLBACK_OPAQUE",
            IssueSeverity::Info,
            "Estrutura fiscal não reconhecida; documento mantido como item único.",
        );
        let mut item = NormalizedItem::new();
        item.set_text(fields::CONTEUDO, text);
        item.set(
            "elemento_raiz",
            Value::String(
                tree.children
                    .first()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
            ),
        );
        vec![item]
    };

    summary.headers_present = Some(false);
    let columns = union_columns(&items);
    finalize(&mut summary, &mut items, columns, config);
    Ok(Normalized {
        summary,
        items,
        text: Some(text.to_string()),
    })
}
