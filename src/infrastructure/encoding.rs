// ============================================================
// ENCODING DETECTOR
// ============================================================
// Statistical charset detection plus a deterministic decode fallback
// chain. Never fails: every byte buffer produces some decoded text and
// a diagnosis of how it was obtained.

use encoding_rs::Encoding;

use crate::domain::summary::EncodingDiagnosis;

/// Bytes inspected by the statistical detector.
pub const MAX_SAMPLE_BYTES: usize = 128 * 1024;

const FALLBACK_ENCODINGS: &[&str] = &[
    "utf-8",
    "utf-16le",
    "utf-16be",
    "iso-8859-1",
    "windows-1252",
    "shift_jis",
    "gb2312",
    "koi8-r",
    "macintosh",
];

pub struct DecodedText {
    pub text: String,
    pub diagnosis: EncodingDiagnosis,
}

/// Decode a byte buffer into text, trying the detected encoding, then
/// caller hints, then the fixed fallback list; a candidate is accepted
/// only when strict decoding introduces no replacement characters. The
/// final fallback is lossy UTF-8.
pub fn decode_bytes(bytes: &[u8], hints: &[String]) -> DecodedText {
    let sample = &bytes[..bytes.len().min(MAX_SAMPLE_BYTES)];
    let (detected, confidence) = detect_statistical(sample);

    let mut attempts: Vec<String> = Vec::new();
    push_unique(&mut attempts, normalize_label(&detected));
    for hint in hints {
        push_unique(&mut attempts, normalize_label(hint));
    }
    for fallback in FALLBACK_ENCODINGS {
        push_unique(&mut attempts, fallback.to_string());
    }

    for label in &attempts {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        let (body, bom_stripped) = strip_bom(bytes, label);
        let (decoded, had_errors) = encoding.decode_without_bom_handling(body);
        if !had_errors {
            return DecodedText {
                text: decoded.into_owned(),
                diagnosis: EncodingDiagnosis {
                    detected: normalize_label(&detected),
                    normalized: label.clone(),
                    confidence,
                    bom_stripped,
                    attempted_encodings: attempts.clone(),
                },
            };
        }
    }

    // Every candidate produced replacement characters; decode lossily.
    let (body, bom_stripped) = strip_bom(bytes, "utf-8");
    DecodedText {
        text: String::from_utf8_lossy(body).into_owned(),
        diagnosis: EncodingDiagnosis {
            detected: normalize_label(&detected),
            normalized: "utf-8".to_string(),
            confidence,
            bom_stripped,
            attempted_encodings: attempts,
        },
    }
}

/// Best-guess encoding and confidence for a byte sample.
fn detect_statistical(sample: &[u8]) -> (String, f64) {
    if sample.is_empty() {
        return ("utf-8".to_string(), 0.0);
    }
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return ("utf-8".to_string(), 1.0);
    }
    if sample.starts_with(&[0xFF, 0xFE]) {
        return ("utf-16le".to_string(), 1.0);
    }
    if sample.starts_with(&[0xFE, 0xFF]) {
        return ("utf-16be".to_string(), 1.0);
    }

    // UTF-16 without BOM shows up as zero bytes on alternating positions.
    if sample.len() >= 4 {
        let pairs = sample.len() / 2;
        let odd_zeros = sample.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
        let even_zeros = sample.iter().step_by(2).filter(|&&b| b == 0).count();
        if odd_zeros * 10 > pairs * 3 {
            return ("utf-16le".to_string(), 0.8);
        }
        if even_zeros * 10 > pairs * 3 {
            return ("utf-16be".to_string(), 0.8);
        }
    }

    match std::str::from_utf8(sample) {
        Ok(text) => {
            let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
            if non_ascii == 0 {
                ("utf-8".to_string(), 0.99)
            } else {
                ("utf-8".to_string(), 0.9)
            }
        }
        Err(_) => {
            // High bytes that are not valid UTF-8: the C1 range
            // (0x80-0x9F) is printable in windows-1252 but a control
            // block in ISO-8859-1.
            let c1 = sample.iter().filter(|&&b| (0x80..0xA0).contains(&b)).count();
            if c1 > 0 {
                ("windows-1252".to_string(), 0.5)
            } else {
                ("iso-8859-1".to_string(), 0.6)
            }
        }
    }
}

fn normalize_label(label: &str) -> String {
    let key: String = label
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    match key.as_str() {
        "utf8" | "utf_8" | "unicode" | "ascii" => "utf-8",
        "utf-16" | "utf16" | "utf16le" | "utf_16le" => "utf-16le",
        "utf16be" | "utf_16be" => "utf-16be",
        "latin1" | "latin-1" | "iso8859_1" | "iso_8859_1" | "iso8859-1" => "iso-8859-1",
        "windows1252" | "cp1252" => "windows-1252",
        "sjis" | "shiftjis" | "shift-jis" => "shift_jis",
        "koi8r" => "koi8-r",
        "macroman" | "mac-roman" => "macintosh",
        _ => return key,
    }
    .to_string()
}

/// Strip the BOM matching the candidate encoding, if present.
fn strip_bom<'a>(bytes: &'a [u8], label: &str) -> (&'a [u8], bool) {
    let bom: &[u8] = match label {
        "utf-8" => &[0xEF, 0xBB, 0xBF],
        "utf-16le" => &[0xFF, 0xFE],
        "utf-16be" => &[0xFE, 0xFF],
        _ => return (bytes, false),
    };
    if bytes.starts_with(bom) {
        (&bytes[bom.len()..], true)
    } else {
        (bytes, false)
    }
}

fn push_unique(attempts: &mut Vec<String>, label: String) {
    if !label.is_empty() && !attempts.contains(&label) {
        attempts.push(label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_never_fails() {
        let decoded = decode_bytes(&[], &[]);
        assert_eq!(decoded.text, "");
        assert_eq!(decoded.diagnosis.confidence, 0.0);
        assert!(!decoded.diagnosis.attempted_encodings.is_empty());
    }

    #[test]
    fn test_single_byte_never_fails() {
        let decoded = decode_bytes(&[0xFF], &[]);
        assert!(!decoded.diagnosis.normalized.is_empty());
    }

    #[test]
    fn test_plain_utf8() {
        let decoded = decode_bytes("emissão de nota".as_bytes(), &[]);
        assert_eq!(decoded.text, "emissão de nota");
        assert_eq!(decoded.diagnosis.normalized, "utf-8");
        assert!(!decoded.diagnosis.bom_stripped);
    }

    #[test]
    fn test_utf8_bom_is_stripped_and_recorded() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("data;valor".as_bytes());
        let decoded = decode_bytes(&bytes, &[]);
        assert_eq!(decoded.text, "data;valor");
        assert!(decoded.diagnosis.bom_stripped);
    }

    #[test]
    fn test_latin1_falls_through_the_chain() {
        // "São Paulo" in ISO-8859-1: ã = 0xE3
        let bytes = b"S\xE3o Paulo";
        let decoded = decode_bytes(bytes, &[]);
        assert_eq!(decoded.text, "São Paulo");
        assert_ne!(decoded.diagnosis.normalized, "utf-8");
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "nota".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode_bytes(&bytes, &[]);
        assert_eq!(decoded.text, "nota");
        assert_eq!(decoded.diagnosis.normalized, "utf-16le");
        assert!(decoded.diagnosis.bom_stripped);
    }

    #[test]
    fn test_caller_hint_is_attempted_before_fallbacks() {
        let bytes = b"S\xE3o Paulo";
        let decoded = decode_bytes(bytes, &["latin1".to_string()]);
        assert_eq!(decoded.text, "São Paulo");
        let attempts = &decoded.diagnosis.attempted_encodings;
        let hint_pos = attempts.iter().position(|e| e == "iso-8859-1").unwrap();
        let w1252_pos = attempts.iter().position(|e| e == "windows-1252");
        if let Some(w1252_pos) = w1252_pos {
            assert!(hint_pos < w1252_pos);
        }
    }
}
