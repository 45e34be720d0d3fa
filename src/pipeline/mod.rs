// src/pipeline/mod.rs

//! End-to-end import flows: acquire, normalize, persist, summarize.

mod import;

pub use import::UrlImporter;

use crate::error::Result;
use crate::models::ImportSummary;
use crate::parser;
use crate::storage::SqliteStore;

/// Import a federal-schema XML document from raw bytes.
pub async fn import_xml_bytes(store: &SqliteStore, bytes: &[u8]) -> Result<ImportSummary> {
    let document = parser::parse_xml(bytes)?;
    let note = store.persist(&document).await?;
    Ok(ImportSummary::from(&note))
}

/// Import a document from an authority consultation URL.
pub async fn import_url(
    store: &SqliteStore,
    importer: &UrlImporter,
    url: &str,
    force_browser: bool,
) -> Result<ImportSummary> {
    let document = importer.import_from_url(url, force_browser).await?;
    let note = store.persist(&document).await?;
    Ok(ImportSummary::from(&note))
}
