// src/fetch/browser.rs

//! Headless-browser fallback for portals that block plain HTTP clients.
//!
//! Each fetch runs a scoped Chromium session: launch, render, extract the
//! DOM, tear down. The whole render is bounded by the configured deadline;
//! a browser that cannot even launch surfaces as `AutomationUnavailable` so
//! callers can tell environment problems apart from slow pages.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;

use crate::config::BrowserFetchOptions;
use crate::error::{AppError, Result};

/// Browser-rendered page acquisition.
#[async_trait]
pub trait BrowserFetcher: Send + Sync {
    /// Render the URL and return the serialized DOM after scripts settled.
    async fn fetch(&self, url: &str, options: &BrowserFetchOptions) -> Result<String>;
}

/// chromiumoxide-backed [`BrowserFetcher`].
pub struct ChromiumFetcher;

#[async_trait]
impl BrowserFetcher for ChromiumFetcher {
    async fn fetch(&self, url: &str, options: &BrowserFetchOptions) -> Result<String> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage");
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(AppError::automation)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::automation(format!("browser launch failed: {e}")))?;

        // Drive CDP messages until the session ends.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let deadline = Duration::from_millis(options.timeout_ms);
        let rendered = tokio::time::timeout(deadline, render_page(&browser, url, options)).await;

        // Teardown happens on every path, including timeout.
        let _ = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();

        match rendered {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::timeout(url, options.timeout_ms)),
        }
    }
}

async fn render_page(browser: &Browser, url: &str, options: &BrowserFetchOptions) -> Result<String> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(AppError::automation)?;
    page.set_user_agent(options.user_agent.as_str())
        .await
        .map_err(AppError::automation)?;

    page.goto(url).await.map_err(AppError::automation)?;
    page.wait_for_navigation()
        .await
        .map_err(AppError::automation)?;

    // Consultation portals finish rendering items from script after load.
    tokio::time::sleep(Duration::from_millis(options.post_load_wait_ms)).await;

    let html: String = page
        .evaluate("document.documentElement.outerHTML")
        .await
        .map_err(AppError::automation)?
        .into_value()
        .map_err(AppError::automation)?;

    let _ = page.close().await;
    log::debug!("browser rendered {url}: {} bytes", html.len());
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a local Chromium install.
    #[tokio::test]
    #[ignore]
    async fn renders_a_data_url() {
        let options = BrowserFetchOptions {
            post_load_wait_ms: 0,
            ..BrowserFetchOptions::default()
        };
        let html = ChromiumFetcher
            .fetch("data:text/html,<p>ok</p>", &options)
            .await
            .unwrap();
        assert!(html.contains("ok"));
    }
}
