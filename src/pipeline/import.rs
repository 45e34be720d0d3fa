// src/pipeline/import.rs

//! URL import flow with block-aware escalation.
//!
//! Every URL starts on the cheap HTTP path unless the caller forces the
//! browser. A block signature triggers exactly one escalation to browser
//! rendering; any other failure (including a page the adapter cannot
//! recognize) surfaces as-is without burning a browser session.

use scraper::Html;

use crate::adapters::AdapterRegistry;
use crate::config::{BrowserFetchOptions, Config};
use crate::error::{AppError, Result};
use crate::fetch::{
    BrowserFetcher, ChromiumFetcher, FetchMethod, HttpFetcher, PageFetcher, body_looks_blocked,
    decide_fetch_method,
};
use crate::models::ParsedDocument;

pub struct UrlImporter {
    registry: AdapterRegistry,
    simple: Box<dyn PageFetcher>,
    browser: Box<dyn BrowserFetcher>,
    browser_options: BrowserFetchOptions,
}

impl UrlImporter {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            registry: AdapterRegistry::new(),
            simple: Box::new(HttpFetcher::new(&config.fetch)?),
            browser: Box::new(ChromiumFetcher),
            browser_options: config.browser.clone(),
        })
    }

    /// Build an importer over custom fetch backends.
    pub fn with_fetchers(
        simple: Box<dyn PageFetcher>,
        browser: Box<dyn BrowserFetcher>,
        browser_options: BrowserFetchOptions,
    ) -> Self {
        Self {
            registry: AdapterRegistry::new(),
            simple,
            browser,
            browser_options,
        }
    }

    /// Fetch the page and extract a document with the adapter matching the
    /// URL's authority.
    pub async fn import_from_url(
        &self,
        url: &str,
        force_browser: bool,
    ) -> Result<ParsedDocument> {
        let adapter = self.registry.select(url);
        log::info!("importing {url} via adapter '{}'", adapter.name());

        if decide_fetch_method(force_browser, false) == FetchMethod::Simple {
            let page = self.simple.fetch(url).await?;
            if !page.is_block_signature() {
                let html = Html::parse_document(&page.body);
                return adapter.parse(&html);
            }
            log::info!(
                "simple fetch of {url} hit a block signature (status {}), escalating to browser",
                page.status
            );
        }

        let body = self.browser.fetch(url, &self.browser_options).await?;
        if body_looks_blocked(&body) {
            return Err(AppError::layout(
                adapter.name(),
                "authority denied access even via browser rendering",
            ));
        }
        let html = Html::parse_document(&body);
        adapter.parse(&html)
    }
}
