// src/models/mod.rs

//! Domain models for the ingestion pipeline.
//!
//! `ParsedDocument`/`ParsedItem` are the transient canonical shape every
//! parser produces; `StoredFiscalNote`/`StoredFiscalItem` are the persisted
//! entities of record.

mod document;
mod note;

use bigdecimal::BigDecimal;
use serde::Serialize;

// Re-export all public types
pub use document::{ParsedDocument, ParsedItem, SourceKind};
pub use note::{StoredFiscalItem, StoredFiscalNote};

/// Success shape handed back to the request layer after an import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub access_key: String,
    pub items_count: usize,
    pub issuer_name: String,
    pub total_amount: BigDecimal,
}

impl From<&StoredFiscalNote> for ImportSummary {
    fn from(note: &StoredFiscalNote) -> Self {
        Self {
            access_key: note.access_key.clone(),
            items_count: note.items.len(),
            issuer_name: note.issuer_name.clone(),
            total_amount: note.total_amount.clone(),
        }
    }
}
