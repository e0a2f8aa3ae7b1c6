use serde_json::Value;

use super::{base_summary, finalize, union_columns, Normalized};
use crate::domain::error::{AppError, Result};
use crate::domain::file_entry::{FileFormat, RawFileEntry};
use crate::domain::item::NormalizedItem;
use crate::domain::summary::EncodingDiagnosis;
use crate::infrastructure::config::PipelineConfig;

/// Normalize JSON-like content: a top-level array yields one item per
/// object; a single object yields one item. The column set is the union
/// of observed keys.
pub fn normalize_structured(
    entry: &RawFileEntry,
    text: &str,
    diagnosis: EncodingDiagnosis,
    mime: Option<String>,
    config: &PipelineConfig,
) -> Result<Normalized> {
    let mut summary = base_summary(entry, FileFormat::StructuredText, mime);
    summary.encoding = Some(diagnosis);

    let value: Value = serde_json::from_str(text)
        .map_err(|e| AppError::ParseError(format!("Invalid JSON in {}: {}", entry.name, e)))?;

    let mut items: Vec<NormalizedItem> = match value {
        Value::Array(values) => values.into_iter().map(value_to_item).collect(),
        other => vec![value_to_item(other)],
    };

    summary.headers_present = Some(false);
    summary.log(format!("{} objeto(s) de nível superior", items.len()));

    let columns = union_columns(&items);
    finalize(&mut summary, &mut items, columns, config);
    Ok(Normalized {
        summary,
        items,
        text: Some(text.to_string()),
    })
}

fn value_to_item(value: Value) -> NormalizedItem {
    let mut item = NormalizedItem::new();
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                if !value.is_null() {
                    item.set(key, value);
                }
            }
        }
        other => item.set("valor", other),
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::encoding::decode_bytes;

    fn normalize(json: &str) -> Normalized {
        let entry = RawFileEntry::new("dados.json", json.as_bytes().to_vec(), None);
        let decoded = decode_bytes(&entry.bytes, &[]);
        normalize_structured(
            &entry,
            &decoded.text,
            decoded.diagnosis,
            Some("application/json".to_string()),
            &PipelineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_array_of_objects_with_key_union() {
        let normalized = normalize(
            r#"[{"produto_nome": "Caneta", "produto_qtd": 10},
                {"produto_nome": "Lápis", "produto_valor_unit": "0,75"}]"#,
        );
        assert_eq!(normalized.items.len(), 2);
        let columns = normalized.summary.columns.clone().unwrap();
        assert!(columns.contains(&"produto_nome".to_string()));
        assert!(columns.contains(&"produto_qtd".to_string()));
        assert!(columns.contains(&"produto_valor_unit".to_string()));
    }

    #[test]
    fn test_single_object_is_one_item() {
        let normalized = normalize(r#"{"nfe_id": "123", "valor_total_nfe": 500.0}"#);
        assert_eq!(normalized.items.len(), 1);
        assert_eq!(normalized.items[0].number("valor_total_nfe"), 500.0);
    }

    #[test]
    fn test_scalar_array_members_become_valor_items() {
        let normalized = normalize("[1, 2]");
        assert_eq!(normalized.items.len(), 2);
        assert_eq!(normalized.items[0].number("valor"), 1.0);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let entry = RawFileEntry::new("ruim.json", b"{not json".to_vec(), None);
        let decoded = decode_bytes(&entry.bytes, &[]);
        assert!(normalize_structured(
            &entry,
            &decoded.text,
            decoded.diagnosis,
            None,
            &PipelineConfig::default(),
        )
        .is_err());
    }
}
