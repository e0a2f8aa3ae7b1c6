// ============================================================
// FLEXIBLE NUMERIC PARSING
// ============================================================
// Handles both Brazilian currency format ("R$ 1.234,56") and the
// standard/XML format ("1,234.56"). The decimal separator is whichever
// of the last comma or last dot occurs further right; the other is
// treated as a thousands separator.

/// Parse a value into a float, or `None` when it carries no number.
pub fn parse_flexible_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut s: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    let last_comma = s.rfind(',');
    let last_dot = s.rfind('.');

    match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => {
            // "1.234,56" - dots are thousands separators
            s = s.replace('.', "").replace(',', ".");
        }
        (Some(_), Some(_)) => {
            // "1,234.56" - commas are thousands separators
            s = s.replace(',', "");
        }
        _ => {
            // Single separator kind at most: "1234,56" or "1234.56"
            s = s.replace(',', ".");
        }
    }

    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Like [`parse_flexible_number`], defaulting to 0 when parsing fails.
pub fn parse_safe_float(value: &str) -> f64 {
    parse_flexible_number(value).unwrap_or(0.0)
}

/// Format a value as pt-BR currency: `R$ 1.234,56`.
pub fn format_currency_brl(value: f64) -> String {
    if !value.is_finite() {
        return "R$ 0,00".to_string();
    }
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let integer = cents / 100;
    let fraction = cents % 100;

    let digits = integer.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{}R$ {},{:02}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brazilian_convention() {
        assert_eq!(parse_flexible_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_flexible_number("R$ 1.234,56"), Some(1234.56));
        assert_eq!(parse_flexible_number("1234,56"), Some(1234.56));
    }

    #[test]
    fn test_standard_convention() {
        assert_eq!(parse_flexible_number("1,234.56"), Some(1234.56));
        assert_eq!(parse_flexible_number("1234.56"), Some(1234.56));
        assert_eq!(parse_flexible_number("42"), Some(42.0));
    }

    #[test]
    fn test_negative_and_garbage() {
        assert_eq!(parse_flexible_number("-10,50"), Some(-10.5));
        assert_eq!(parse_flexible_number(""), None);
        assert_eq!(parse_flexible_number("abc"), None);
        assert_eq!(parse_safe_float("abc"), 0.0);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency_brl(1234.56), "R$ 1.234,56");
        assert_eq!(format_currency_brl(0.0), "R$ 0,00");
        assert_eq!(format_currency_brl(-500.01), "-R$ 500,01");
        assert_eq!(format_currency_brl(1_000_000.0), "R$ 1.000.000,00");
    }
}
