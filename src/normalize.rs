use serde_json::Value;

/// Spreadsheet error tokens that collapse to zero. Matched case-insensitively
/// as substrings, so "  #n/a " in a cell still counts.
const ERROR_TOKENS: [&str; 6] = ["#N/A", "#DIV/0!", "#NUM!", "#VALUE!", "#REF!", "#NAME?"];

/// Number formatting convention of the spreadsheet cells being normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    /// `.` thousands separator, `,` decimal separator ("1.234,56").
    #[default]
    PtBr,
    /// `,` thousands separator, `.` decimal separator ("1,234.56").
    EnUs,
}

/// Converts one raw cell into a number using the pt-BR convention the source
/// spreadsheet is written in. Never fails: blanks, error tokens and garbage
/// all degrade to 0.
pub fn normalize(raw: &Value) -> f64 {
    normalize_with_locale(raw, Locale::PtBr)
}

pub fn normalize_with_locale(raw: &Value, locale: Locale) -> f64 {
    match raw {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => normalize_str(s, locale),
        // Arrays and objects have no numeric reading
        _ => 0.0,
    }
}

fn normalize_str(raw: &str, locale: Locale) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let upper = trimmed.to_uppercase();
    if ERROR_TOKENS.iter().any(|token| upper.contains(token)) {
        return 0.0;
    }

    // Keep only the characters that can take part in a number; currency
    // symbols, spaces and unit suffixes all go.
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    let candidate = match locale {
        // Periods are thousands separators; the first comma is the decimal
        // point. A second comma makes the string non-numeric and falls
        // through to 0 with the rest of the garbage.
        Locale::PtBr => cleaned.replace('.', "").replacen(',', ".", 1),
        Locale::EnUs => cleaned.replace(',', ""),
    };

    candidate.parse::<f64>().unwrap_or(0.0)
}
