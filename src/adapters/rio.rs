// src/adapters/rio.rs

//! Adapter for SEFAZ-RJ's NFC-e consultation layout.
//!
//! The Rio page has no item table. Each item prints as a run of short text
//! blocks, with the field value either on the label line or on the line
//! right after it:
//!
//! ```text
//! TAXA ENTREGA
//! (Código: 6378
//! )
//! Qtde.:1
//! UN: UN
//! Vl. Unit.: 7,99
//! Vl. Total 7,99
//! ```
//!
//! Extraction walks the page's text lines around each `Qtde` marker instead
//! of selecting markup.

use bigdecimal::{BigDecimal, Zero};
use regex::Captures;
use scraper::Html;

use super::{
    SiteAdapter, compile, extract_access_key, extract_emission_date, issuer_from_header,
    page_text, text_lines,
};
use crate::error::{AppError, Result};
use crate::models::{ParsedDocument, ParsedItem, SourceKind};
use crate::utils::decimal_from_br;

const NAME: &str = "rio";

/// How many lines above a quantity marker may hold the product name.
const NAME_LOOKBACK: usize = 8;
/// How many lines below a quantity marker may hold the remaining fields.
const FIELD_LOOKAHEAD: usize = 15;

pub struct RioAdapter;

impl SiteAdapter for RioAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parse(&self, html: &Html) -> Result<ParsedDocument> {
        let text = page_text(html);
        let lines = text_lines(html);

        let issuer_name = self
            .issuer(html, &lines)?
            .ok_or_else(|| AppError::layout(NAME, "issuer block not found"))?;
        let total_amount = self
            .total(&text)?
            .ok_or_else(|| AppError::layout(NAME, "payable total line not found"))?;
        let emitted_at = extract_emission_date(&text)?
            .ok_or_else(|| AppError::layout(NAME, "emission date not found"))?;
        let items = self.items(&lines)?;
        let access_key = extract_access_key(html, &text)?.unwrap_or_default();

        Ok(ParsedDocument {
            access_key,
            issuer_name,
            emitted_at,
            total_amount,
            source: SourceKind::Scrape,
            items,
        })
    }
}

impl RioAdapter {
    fn issuer(&self, html: &Html, lines: &[String]) -> Result<Option<String>> {
        if let Some(name) = issuer_from_header(html)? {
            return Ok(Some(name));
        }
        // Text-only fallback: the establishment name either shares the CNPJ
        // line or sits right above it.
        for (i, line) in lines.iter().enumerate() {
            if !line.to_uppercase().contains("CNPJ:") {
                continue;
            }
            let head = line
                .split("CNPJ")
                .next()
                .unwrap_or("")
                .trim_matches(|c: char| c.is_whitespace() || c == ':' || c == '-');
            if !head.is_empty() {
                return Ok(Some(head.to_string()));
            }
            if i > 0 {
                return Ok(Some(lines[i - 1].clone()));
            }
        }
        Ok(None)
    }

    fn total(&self, text: &str) -> Result<Option<BigDecimal>> {
        let re = compile(r"(?i)Valor\s+a\s+pagar\s*R\$\s*:?\s*([\d.,]+)")?;
        Ok(re.captures(text).and_then(|caps| decimal_from_br(&caps[1])))
    }

    /// Walk every `Qtde` marker; fields follow the marker, the name precedes
    /// it. A page with no markers at all is an unrecognized layout, while
    /// markers that fail field extraction are skipped individually.
    fn items(&self, lines: &[String]) -> Result<Vec<ParsedItem>> {
        let qty_re = compile(r"(?i)^Qtde\.?\s*:\s*(\S*)")?;
        let unit_re = compile(r"(?i)^UN\s*:\s*(\S*)")?;
        let unit_price_re = compile(r"(?i)^Vl\.?\s*Unit\.?\s*:?\s*([\d.,]*)")?;
        let total_re = compile(r"(?i)^Vl\.?\s*Total\s*:?\s*([\d.,]*)")?;

        let mut items = Vec::new();
        let mut saw_marker = false;

        for (i, line) in lines.iter().enumerate() {
            let Some(marker) = qty_re.captures(line) else {
                continue;
            };
            saw_marker = true;

            let (qty_text, scan_from) = match non_empty_group(&marker) {
                Some(inline) => (inline, i + 1),
                None => (lines.get(i + 1).cloned().unwrap_or_default(), i + 2),
            };

            let mut unit = None;
            let mut unit_price = None;
            let mut total_price = None;
            for j in scan_from..lines.len().min(i + FIELD_LOOKAHEAD) {
                let current = &lines[j];
                if qty_re.is_match(current) {
                    // Next item's block starts; this one has no more fields.
                    break;
                }
                if let Some(caps) = unit_re.captures(current) {
                    unit = inline_or_next(&caps, lines, j);
                } else if let Some(caps) = unit_price_re.captures(current) {
                    unit_price = inline_or_next(&caps, lines, j).and_then(|v| decimal_from_br(&v));
                } else if let Some(caps) = total_re.captures(current) {
                    total_price = inline_or_next(&caps, lines, j).and_then(|v| decimal_from_br(&v));
                    break;
                }
            }

            let Some(quantity) = decimal_from_br(&qty_text) else {
                log::warn!("skipping item block without readable quantity: {line}");
                continue;
            };
            let (Some(product_name), Some(unit_price)) = (name_before(lines, i), unit_price)
            else {
                log::warn!("skipping item block without name/unit price: {line}");
                continue;
            };
            if quantity <= BigDecimal::zero() {
                continue;
            }
            let total_price = total_price.unwrap_or_else(|| unit_price.clone());
            items.push(ParsedItem {
                product_name,
                quantity,
                unit_price,
                total_price,
                unit: unit.filter(|u| !u.is_empty()),
            });
        }

        if !saw_marker {
            return Err(AppError::layout(NAME, "item blocks (Qtde markers) not found"));
        }
        Ok(items)
    }
}

/// Nearest line above the marker that reads like a product name: not bare
/// digits, not a product-code line, not another field label.
fn name_before(lines: &[String], index: usize) -> Option<String> {
    for j in (index.saturating_sub(NAME_LOOKBACK)..index).rev() {
        let candidate = &lines[j];
        if candidate.len() <= 3 || candidate.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if candidate.contains("Código") || candidate.contains(')') {
            continue;
        }
        let lower = candidate.to_lowercase();
        if ["qtde", "vl.", "un:", "cnpj", "documento auxiliar"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            continue;
        }
        if candidate.chars().any(char::is_alphabetic) {
            return Some(candidate.clone());
        }
    }
    None
}

fn non_empty_group(caps: &Captures<'_>) -> Option<String> {
    caps.get(1)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn inline_or_next(caps: &Captures<'_>, lines: &[String], index: usize) -> Option<String> {
    non_empty_group(caps).or_else(|| lines.get(index + 1).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const FIXTURE: &str = r#"
        <html><body>
          <div class="txtTopo">SUPERMERCADO ZONA SUL SA</div>
          <div class="text">CNPJ: 33.381.286/0001-54</div>
          <div>TAXA ENTREGA CAMBOIN</div>
          <div>(Código: 6378</div><div>)</div>
          <div>Qtde.:1</div>
          <div>UN: UN</div>
          <div>Vl. Unit.: 7,99</div>
          <div>Vl. Total 7,99</div>
          <div>CERVEJA LATA 350ML</div>
          <div>Qtde.:</div><div>6</div>
          <div>UN: UN</div>
          <div>Vl. Unit.:</div><div>4,50</div>
          <div>Vl. Total</div><div>27,00</div>
          <div>Valor a pagar R$:</div><div>34,99</div>
          <div>Emiss&#227;o: 11/02/2026 07:35:22-03:00</div>
          <div>Chave de acesso</div>
          <div>3326 0210 6976 9700 0660 6510 7000 3680 6612 6649 4182</div>
        </body></html>
    "#;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_line_based_layout() {
        let html = Html::parse_document(FIXTURE);
        let doc = RioAdapter.parse(&html).unwrap();

        assert!(doc.issuer_name.starts_with("SUPERMERCADO ZONA SUL SA"));
        assert_eq!(doc.total_amount, dec("34.99"));
        assert_eq!(doc.emitted_at.to_string(), "2026-02-11 07:35:22");
        assert_eq!(
            doc.access_key,
            "33260210697697000660651070003680661266494182"
        );
        assert_eq!(doc.items.len(), 2);

        let first = &doc.items[0];
        assert_eq!(first.product_name, "TAXA ENTREGA CAMBOIN");
        assert_eq!(first.quantity, dec("1"));
        assert_eq!(first.unit_price, dec("7.99"));
        assert_eq!(first.total_price, dec("7.99"));
        assert_eq!(first.unit.as_deref(), Some("UN"));

        // Second block keeps every value on the line after its label.
        let second = &doc.items[1];
        assert_eq!(second.product_name, "CERVEJA LATA 350ML");
        assert_eq!(second.quantity, dec("6"));
        assert_eq!(second.unit_price, dec("4.50"));
        assert_eq!(second.total_price, dec("27.00"));
    }

    #[test]
    fn page_without_quantity_markers_is_unrecognized() {
        let html = Html::parse_document(
            r#"<html><body>
              <div class="txtTopo">LOJA RJ</div>
              <div>Valor a pagar R$: 10,00</div>
              <div>Emissão: 01/02/2026</div>
            </body></html>"#,
        );
        assert!(matches!(
            RioAdapter.parse(&html),
            Err(AppError::UnrecognizedLayout { .. })
        ));
    }

    #[test]
    fn marker_without_unit_price_is_skipped() {
        let html = Html::parse_document(
            r#"<html><body>
              <div class="txtTopo">LOJA RJ</div>
              <div>PRODUTO QUEBRADO</div>
              <div>Qtde.:2</div>
              <div>PRODUTO INTEIRO</div>
              <div>Qtde.:1</div>
              <div>Vl. Unit.: 5,00</div>
              <div>Vl. Total 5,00</div>
              <div>Valor a pagar R$: 5,00</div>
              <div>Emissão: 01/02/2026</div>
            </body></html>"#,
        );
        let doc = RioAdapter.parse(&html).unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].product_name, "PRODUTO INTEIRO");
        assert_eq!(doc.items[0].unit, None);
    }

    #[test]
    fn issuer_falls_back_to_cnpj_line() {
        let html = Html::parse_document(
            r#"<html><body>
              <div>PADARIA IMPERIAL LTDA - CNPJ: 12.345.678/0001-00</div>
              <div>PAO FRANCES</div>
              <div>Qtde.:10</div>
              <div>Vl. Unit.: 0,85</div>
              <div>Vl. Total 8,50</div>
              <div>Valor a pagar R$: 8,50</div>
              <div>Emissão: 01/02/2026</div>
            </body></html>"#,
        );
        let doc = RioAdapter.parse(&html).unwrap();
        assert_eq!(doc.issuer_name, "PADARIA IMPERIAL LTDA");
    }
}
