// src/fetch/mod.rs

//! Page acquisition: cheap HTTP first, browser rendering only when the
//! authority blocks plain clients.

mod browser;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::Result;

pub use browser::{BrowserFetcher, ChromiumFetcher};

/// Substrings that mark an authority block page regardless of status code.
const BLOCK_MARKERS: &[&str] = &["acesso negado ao portal", "acesso bloqueado"];

/// How a page should be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    /// Plain HTTP GET
    Simple,
    /// Headless browser rendering
    Browser,
}

/// Pick the acquisition method for a URL.
///
/// The browser path is chosen up front only on explicit request or when a
/// prior simple fetch of this URL was blocked; everything else starts cheap.
pub fn decide_fetch_method(force_browser: bool, prior_block: bool) -> FetchMethod {
    if force_browser || prior_block {
        FetchMethod::Browser
    } else {
        FetchMethod::Simple
    }
}

/// Outcome of a simple fetch: final status plus the body text.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    /// True when the response is an authority block rather than content.
    pub fn is_block_signature(&self) -> bool {
        matches!(self.status, 403 | 429) || body_looks_blocked(&self.body)
    }
}

/// True when the body text carries a known block-page marker.
pub fn body_looks_blocked(body: &str) -> bool {
    let lower = body.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Simple HTTP page acquisition.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// reqwest-backed [`PageFetcher`].
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        log::debug!("fetched {url}: status {status}, {} bytes", body.len());
        Ok(FetchedPage { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_decision_truth_table() {
        assert_eq!(decide_fetch_method(false, false), FetchMethod::Simple);
        assert_eq!(decide_fetch_method(true, false), FetchMethod::Browser);
        assert_eq!(decide_fetch_method(false, true), FetchMethod::Browser);
        assert_eq!(decide_fetch_method(true, true), FetchMethod::Browser);
    }

    #[test]
    fn block_statuses_are_signatures() {
        for status in [403, 429] {
            let page = FetchedPage {
                status,
                body: "<html></html>".into(),
            };
            assert!(page.is_block_signature());
        }
    }

    #[test]
    fn block_markers_match_case_insensitively() {
        let page = FetchedPage {
            status: 200,
            body: "<h1>ACESSO NEGADO AO PORTAL</h1>".into(),
        };
        assert!(page.is_block_signature());
        assert!(body_looks_blocked("sistema informa: Acesso Bloqueado."));
    }

    #[test]
    fn ordinary_pages_are_not_blocked() {
        let page = FetchedPage {
            status: 200,
            body: "<html><body>Nota fiscal</body></html>".into(),
        };
        assert!(!page.is_block_signature());
        let not_found = FetchedPage {
            status: 404,
            body: String::new(),
        };
        assert!(!not_found.is_block_signature());
    }
}
