// src/adapters/default.rs

//! Generic adapter for the table-based layout most state portals share.

use bigdecimal::{BigDecimal, Zero};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{
    SiteAdapter, compile, element_text, extract_access_key, extract_emission_date, extract_total,
    issuer_from_header, page_text, parse_selector,
};
use crate::error::{AppError, Result};
use crate::models::{ParsedDocument, ParsedItem, SourceKind};
use crate::utils::decimal_from_br;

const NAME: &str = "default";

/// Table and label heuristics covering the common SEFAZ layout, with a
/// generic-table fallback for portals that diverge only in markup ids.
pub struct DefaultAdapter;

impl SiteAdapter for DefaultAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn parse(&self, html: &Html) -> Result<ParsedDocument> {
        let text = page_text(html);

        let issuer_name = self
            .issuer(html)?
            .ok_or_else(|| AppError::layout(NAME, "issuer block not found"))?;
        let total_amount = extract_total(html, &text)?
            .ok_or_else(|| AppError::layout(NAME, "total line not found"))?;
        let emitted_at = extract_emission_date(&text)?
            .ok_or_else(|| AppError::layout(NAME, "emission date not found"))?;
        let items = self.items(html)?;
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

impl DefaultAdapter {
    fn issuer(&self, html: &Html) -> Result<Option<String>> {
        if let Some(name) = issuer_from_header(html)? {
            return Ok(Some(name));
        }
        for selector in ["h1", "h2"] {
            let sel = parse_selector(selector)?;
            if let Some(el) = html.select(&sel).next() {
                let text = element_text(&el);
                if !text.is_empty() {
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }

    fn items(&self, html: &Html) -> Result<Vec<ParsedItem>> {
        let tab = parse_selector("table#tabResult")?;
        if let Some(table) = html.select(&tab).next() {
            return self.items_from_result_table(&table);
        }
        if let Some(items) = self.items_from_generic_table(html)? {
            return Ok(items);
        }
        Err(AppError::layout(NAME, "item table not found"))
    }

    /// `#tabResult` rows: name in `span.txtTit`, quantity, unit and unit
    /// price in labeled spans of the first cell, row total in the second
    /// cell. A present table with zero item rows is a valid empty document.
    fn items_from_result_table(&self, table: &ElementRef<'_>) -> Result<Vec<ParsedItem>> {
        let row_sel = parse_selector("tr")?;
        let name_sel = parse_selector("span.txtTit")?;
        let qty_sel = parse_selector("span.Rqtd")?;
        let unit_sel = parse_selector("span.RUN")?;
        let unit_price_sel = parse_selector("span.RvlUnit")?;
        let total_sel = parse_selector("td span.valor")?;

        let qty_re = compile(r"(?i)Qtde\.?\s*:?\s*([0-9.,]+)")?;
        let unit_re = compile(r"(?i)UN\s*:\s*(\w+)")?;
        let unit_price_re = compile(r"(?i)Vl\.?\s*Unit\.?\s*:?\s*([0-9.,]+)")?;

        let mut items = Vec::new();
        for row in table.select(&row_sel) {
            if !row
                .value()
                .attr("id")
                .is_some_and(|id| id.starts_with("Item"))
            {
                continue;
            }

            let Some(name_el) = row.select(&name_sel).next() else {
                continue;
            };
            let product_name = element_text(&name_el);

            let quantity =
                labeled_field(&row, &qty_sel, &qty_re).and_then(|v| decimal_from_br(&v));
            let unit = labeled_field(&row, &unit_sel, &unit_re);
            let unit_price =
                labeled_field(&row, &unit_price_sel, &unit_price_re).and_then(|v| decimal_from_br(&v));
            // Row total is read from its own cell, never derived.
            let total_price = row
                .select(&total_sel)
                .next()
                .map(|el| element_text(&el))
                .and_then(|t| decimal_from_br(&t));

            let (Some(quantity), Some(unit_price)) = (quantity, unit_price) else {
                log::warn!("skipping item row without quantity/unit price: {product_name}");
                continue;
            };
            if product_name.is_empty() || quantity <= BigDecimal::zero() {
                log::warn!("skipping item row with empty name or non-positive quantity");
                continue;
            }
            let total_price = total_price.unwrap_or_else(|| unit_price.clone());
            items.push(ParsedItem {
                product_name,
                quantity,
                unit_price,
                total_price,
                unit,
            });
        }
        Ok(items)
    }

    /// Column-based fallback: any table whose header row has at least three
    /// columns, read as name / quantity / unit / unit price / row total.
    /// Returns `None` when no table yields items.
    fn items_from_generic_table(&self, html: &Html) -> Result<Option<Vec<ParsedItem>>> {
        let table_sel = parse_selector("table")?;
        let row_sel = parse_selector("tr")?;
        let cell_sel = parse_selector("td")?;
        let header_sel = parse_selector("th, td")?;

        for table in html.select(&table_sel) {
            let rows: Vec<_> = table.select(&row_sel).collect();
            if rows.len() < 2 || rows[0].select(&header_sel).count() < 3 {
                continue;
            }

            let mut items = Vec::new();
            for row in &rows[1..] {
                let cells: Vec<String> = row.select(&cell_sel).map(|c| element_text(&c)).collect();
                if cells.len() < 4 || cells[0].is_empty() {
                    continue;
                }
                let Some(quantity) = decimal_from_br(&cells[1]) else {
                    continue;
                };
                if quantity <= BigDecimal::zero() {
                    continue;
                }
                let Some(unit_price) = decimal_from_br(&cells[3]) else {
                    continue;
                };
                let total_price = cells
                    .get(4)
                    .and_then(|c| decimal_from_br(c))
                    .unwrap_or_else(|| unit_price.clone());
                items.push(ParsedItem {
                    product_name: cells[0].clone(),
                    quantity,
                    unit_price,
                    total_price,
                    unit: (!cells[2].is_empty()).then(|| cells[2].clone()),
                });
            }
            if !items.is_empty() {
                return Ok(Some(items));
            }
        }
        Ok(None)
    }
}

fn labeled_field(row: &ElementRef<'_>, selector: &Selector, pattern: &Regex) -> Option<String> {
    let el = row.select(selector).next()?;
    let text = element_text(&el);
    pattern.captures(&text).map(|caps| caps[1].to_string())
}
