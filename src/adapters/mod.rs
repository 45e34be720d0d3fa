// src/adapters/mod.rs

//! Per-authority HTML extraction strategies behind one contract.
//!
//! New authorities are added by implementing [`SiteAdapter`] and registering
//! a host signature in [`AdapterRegistry`], never by extending an existing
//! adapter.

mod default;
mod rio;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::ParsedDocument;
use crate::utils;

// Re-export the adapter variants
pub use default::DefaultAdapter;
pub use rio::RioAdapter;

/// A parsing strategy bound to one authority page layout family.
pub trait SiteAdapter: Send + Sync {
    /// Short identifier used in logs and layout errors.
    fn name(&self) -> &'static str;

    /// Extract a document from a fetched page.
    ///
    /// Fails with `UnrecognizedLayout` when the expected anchor elements
    /// (issuer block, total line, item region) are missing, so callers can
    /// tell "structure not understood" apart from "parsed, zero items".
    /// Access key and unit of measure are optional and never cause failure.
    fn parse(&self, html: &Html) -> Result<ParsedDocument>;
}

/// Static routing table from authority host signatures to adapters.
pub struct AdapterRegistry {
    routes: Vec<(&'static str, Box<dyn SiteAdapter>)>,
    fallback: Box<dyn SiteAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            routes: vec![("fazenda.rj.gov.br", Box::new(RioAdapter))],
            fallback: Box::new(DefaultAdapter),
        }
    }

    /// Match the URL host against known authority signatures.
    ///
    /// Unknown authorities degrade to the generic adapter; selection itself
    /// never fails. An import only fails later, if that adapter cannot
    /// recognize the page.
    pub fn select(&self, url: &str) -> &dyn SiteAdapter {
        if let Some(host) = utils::host_of(url) {
            for (signature, adapter) in &self.routes {
                if host.ends_with(signature) {
                    return adapter.as_ref();
                }
            }
        }
        self.fallback.as_ref()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// --- Extraction helpers shared by the adapter set ---

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::pattern(selector, format!("{e:?}")))
}

pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::pattern(pattern, e))
}

/// Visible text of one element, whitespace-normalized.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text of the whole page, whitespace-normalized.
pub(crate) fn page_text(html: &Html) -> String {
    html.root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Visible text as one entry per text node — the closest analogue of the
/// page's printed line structure for non-tabular layouts.
pub(crate) fn text_lines(html: &Html) -> Vec<String> {
    html.root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Issuer name from the common header block (`div.txtTopo`), with the CNPJ
/// line appended when the sibling element carries it.
pub(crate) fn issuer_from_header(html: &Html) -> Result<Option<String>> {
    let topo = parse_selector("div.txtTopo")?;
    let Some(el) = html.select(&topo).next() else {
        return Ok(None);
    };
    let name = element_text(&el);
    if name.is_empty() {
        return Ok(None);
    }
    let cnpj = el
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sib| sib.value().classes().any(|c| c == "text"))
        .map(|sib| element_text(&sib))
        .filter(|t| t.to_uppercase().contains("CNPJ:"));
    Ok(Some(match cnpj {
        Some(c) => format!("{name}; {c}"),
        None => name,
    }))
}

/// 44-digit access key: `span.chave` first, then the labeled text, then a
/// bare digit run. `None` when the page omits it — tolerated, not an error.
pub(crate) fn extract_access_key(html: &Html, text: &str) -> Result<Option<String>> {
    let chave = parse_selector("span.chave")?;
    if let Some(el) = html.select(&chave).next() {
        if let Some(key) = utils::normalize_access_key(&element_text(&el)) {
            return Ok(Some(key));
        }
    }

    let labeled = compile(r"(?i)Chave\s+de\s+acesso\D*([0-9 ]{44,60})")?;
    if let Some(caps) = labeled.captures(text) {
        if let Some(key) = utils::normalize_access_key(&caps[1]) {
            return Ok(Some(key));
        }
    }

    // Unlabeled renderings: contiguous, or grouped in 4-digit blocks.
    for pattern in [r"\b\d{44}\b", r"\b\d{4}(?:\s\d{4}){10}\b"] {
        let re = compile(pattern)?;
        if let Some(m) = re.find(text) {
            if let Some(key) = utils::normalize_access_key(m.as_str()) {
                return Ok(Some(key));
            }
        }
    }
    Ok(None)
}

/// Emission timestamp from the labeled "Emissão:" text, falling back to the
/// first bare DD/MM/YYYY on the page.
pub(crate) fn extract_emission_date(text: &str) -> Result<Option<NaiveDateTime>> {
    let labeled =
        compile(r"(?i)Emiss[ãa]o\s*:?\s*(\d{2}/\d{2}/\d{4})(?:\s+(\d{2}:\d{2}:\d{2}))?")?;
    if let Some(caps) = labeled.captures(text) {
        if let Some(dt) = br_datetime(&caps[1], caps.get(2).map(|m| m.as_str())) {
            return Ok(Some(dt));
        }
    }
    let bare = compile(r"\b(\d{2}/\d{2}/\d{4})\b")?;
    if let Some(caps) = bare.captures(text) {
        if let Some(dt) = br_datetime(&caps[1], None) {
            return Ok(Some(dt));
        }
    }
    Ok(None)
}

fn br_datetime(date: &str, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date, "%d/%m/%Y").ok()?;
    match time {
        Some(t) => chrono::NaiveTime::parse_from_str(t, "%H:%M:%S")
            .ok()
            .map(|t| date.and_time(t)),
        None => date.and_hms_opt(0, 0, 0),
    }
}

/// Grand total from the marked total span or the labeled total lines.
pub(crate) fn extract_total(html: &Html, text: &str) -> Result<Option<BigDecimal>> {
    for selector in ["span.totalNumb.txtMax", "span.totalNumb"] {
        let sel = parse_selector(selector)?;
        if let Some(el) = html.select(&sel).next() {
            if let Some(value) = utils::decimal_from_br(&element_text(&el)) {
                return Ok(Some(value));
            }
        }
    }
    for pattern in [
        r"(?i)Valor\s+a\s+pagar\s*R?\$?\s*:?\s*([\d.,]+)",
        r"(?i)Valor\s+total\s*R?\$?\s*:?\s*([\d.,]+)",
    ] {
        let re = compile(pattern)?;
        if let Some(caps) = re.captures(text) {
            if let Some(value) = utils::decimal_from_br(&caps[1]) {
                return Ok(Some(value));
            }
        }
    }
    Ok(None)
}
