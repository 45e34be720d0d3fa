// src/models/note.rs

//! Persisted fiscal note entities.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use super::SourceKind;

/// A stored fiscal note. Created once at first successful import of an access
/// key and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFiscalNote {
    /// System-assigned row id
    pub id: i64,

    /// Bare 44-digit authority key; empty when the source omitted it.
    /// Unique across all notes when non-empty.
    pub access_key: String,

    pub issuer_name: String,

    pub emitted_at: NaiveDateTime,

    pub total_amount: BigDecimal,

    pub source: SourceKind,

    /// When this row was first stored
    pub created_at: DateTime<Utc>,

    /// Items owned by this note; deleted with it, never shared
    pub items: Vec<StoredFiscalItem>,
}

/// An item row belonging to exactly one stored note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFiscalItem {
    pub id: i64,
    pub note_id: i64,
    pub product_name: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
    pub unit: Option<String>,
}
