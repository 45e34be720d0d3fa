// src/models/document.rs

//! Canonical document shape produced by every parser.

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which kind of source a document was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceKind {
    /// Uploaded federal-schema XML file
    Xml,
    /// Authority-hosted verification page
    Scrape,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "XML",
            Self::Scrape => "SCRAPE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "XML" => Some(Self::Xml),
            "SCRAPE" => Some(Self::Scrape),
            _ => None,
        }
    }
}

/// One product line extracted from a document.
///
/// `quantity` and `unit_price` are read from their own labeled source fields
/// and are never derived from `total_price` — the total carries
/// authority-specific rounding that must survive verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub product_name: String,

    /// Strictly positive when extraction succeeds
    pub quantity: BigDecimal,

    pub unit_price: BigDecimal,

    pub total_price: BigDecimal,

    /// Unit of measure; some layouts omit it
    pub unit: Option<String>,
}

/// A fiscal document normalized from XML or a scraped page, not yet stored.
///
/// Created by a parser, consumed immediately by the persistence gate, then
/// discarded — it carries no identity of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Bare 44-digit authority key; empty when the source layout omits it
    pub access_key: String,

    /// Seller/establishment name
    pub issuer_name: String,

    /// Emission timestamp printed by the authority
    pub emitted_at: NaiveDateTime,

    /// The authority's printed grand total. Never reconciled against the item
    /// sum; partial item extraction does not change it.
    pub total_amount: BigDecimal,

    pub source: SourceKind,

    /// Ordered item lines; empty for header-only receipts
    pub items: Vec<ParsedItem>,
}
