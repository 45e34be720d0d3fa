// src/utils/mod.rs

//! Numeric normalization and URL helpers shared by parsers and adapters.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use url::Url;

/// Parse a decimal as written in the federal XML schema.
///
/// The schema uses `.` as the decimal separator. A stray `,` is tolerated,
/// but `.` must not be stripped here — that is the Brazilian page format,
/// handled by [`decimal_from_br`].
pub fn decimal_from_xml(raw: &str) -> Option<BigDecimal> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    BigDecimal::from_str(&normalized).ok()
}

/// Parse a decimal as printed on SEFAZ pages ("1.234,56").
///
/// `.` is a thousands separator and is stripped before `,` becomes the
/// decimal point.
pub fn decimal_from_br(raw: &str) -> Option<BigDecimal> {
    let normalized = raw.trim().replace('.', "").replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    BigDecimal::from_str(&normalized).ok()
}

/// Canonicalize an access key to its bare 44-digit form.
///
/// Accepts the spaced rendering from verification pages ("3326 0210 ...") and
/// the `NFe`-prefixed `Id` attribute from XML. Returns `None` when the input
/// does not reduce to 44 digits.
pub fn normalize_access_key(raw: &str) -> Option<String> {
    let stripped = raw.trim();
    let stripped = stripped.strip_prefix("NFe").unwrap_or(stripped);
    let compact: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() == 44 && compact.chars().all(|c| c.is_ascii_digit()) {
        Some(compact)
    } else {
        None
    }
}

/// Extract the host from a URL string.
pub fn host_of(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}
