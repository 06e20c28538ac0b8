//! Headless Chromium rendering backend.
//!
//! A worker is one long-lived browser process with its own profile directory,
//! driven over the DevTools protocol. Each render opens a tab, loads the
//! markup, waits for web fonts, prints the tab to PDF and closes the tab. The
//! browser and its font cache stay up for the next render on that worker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::render::backend::{RenderBackend, RenderError};
use crate::render::composer::{RenderOptions, RenderableDocument};

/// CDP takes paper and margin sizes in inches.
const CSS_PX_PER_INCH: f64 = 96.0;

/// Resolves once every web font the page asked for has loaded or failed.
const FONTS_READY_SCRIPT: &str = "document.fonts.ready.then(() => true)";

#[derive(Debug, Clone)]
pub struct ChromiumBackend {
    binary: PathBuf,
    /// Per DevTools request, and for the browser to come up.
    timeout: Duration,
}

/// A running browser plus the task draining its DevTools event stream.
pub struct ChromiumWorker {
    browser: Browser,
    events: JoinHandle<()>,
    profile: TempDir,
    renders: u64,
}

impl Drop for ChromiumWorker {
    fn drop(&mut self) {
        self.events.abort();
    }
}

impl ChromiumBackend {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig, String> {
        BrowserConfig::builder()
            .chrome_executable(&self.binary)
            .user_data_dir(profile)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .launch_timeout(self.timeout)
            .request_timeout(self.timeout)
            .build()
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    type Worker = ChromiumWorker;

    async fn launch(&self) -> Result<ChromiumWorker, RenderError> {
        let profile = tempfile::Builder::new()
            .prefix("inknotes-chromium-")
            .tempdir()
            .map_err(|e| RenderError::Launch(format!("cannot create profile dir: {e}")))?;
        let config = self.browser_config(profile.path()).map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(format!("{}: {e}", self.binary.display())))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("DevTools connection failed: {e}");
                    break;
                }
            }
        });

        info!(profile = %profile.path().display(), "Chromium worker started");
        Ok(ChromiumWorker {
            browser,
            events,
            profile,
            renders: 0,
        })
    }

    async fn render(
        &self,
        worker: &mut ChromiumWorker,
        document: &RenderableDocument,
    ) -> Result<Bytes, RenderError> {
        let page = worker
            .browser
            .new_page("about:blank")
            .await
            .map_err(backend_error)?;

        let printed = print_page(&page, document).await;
        if let Err(e) = page.close().await {
            debug!("Closing tab failed: {e}");
        }
        let pdf = printed?;

        worker.renders += 1;
        debug!(
            page = document.page_number,
            renders = worker.renders,
            bytes = pdf.len(),
            "Page printed to PDF"
        );
        Ok(Bytes::from(pdf))
    }

    async fn retire(&self, mut worker: ChromiumWorker) {
        if let Err(e) = worker.browser.close().await {
            debug!("Browser close request failed: {e}");
        }
        if let Err(e) = worker.browser.wait().await {
            debug!("Waiting for browser exit failed: {e}");
        }
        info!(
            profile = %worker.profile.path().display(),
            renders = worker.renders,
            "Chromium worker stopped"
        );
    }
}

async fn print_page(page: &Page, document: &RenderableDocument) -> Result<Vec<u8>, RenderError> {
    page.set_content(&document.markup)
        .await
        .map_err(backend_error)?;
    page.evaluate(FONTS_READY_SCRIPT)
        .await
        .map_err(backend_error)?;
    page.pdf(print_params(&document.options))
        .await
        .map_err(backend_error)
}

/// Paper size and margins come from the document options; the `@page` rule in
/// the markup agrees with them.
fn print_params(options: &RenderOptions) -> PrintToPdfParams {
    let (width, height) = options.format.size_inches();
    let margin = f64::from(options.margin_px) / CSS_PX_PER_INCH;
    PrintToPdfParams {
        print_background: Some(options.print_background),
        display_header_footer: Some(false),
        prefer_css_page_size: Some(true),
        paper_width: Some(width),
        paper_height: Some(height),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        ..Default::default()
    }
}

fn backend_error(e: CdpError) -> RenderError {
    RenderError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_fails_to_launch() {
        let backend = ChromiumBackend::new(
            "/nonexistent/inknotes-chromium",
            Duration::from_secs(1),
        );
        let err = backend.launch().await.err().unwrap();
        assert!(matches!(err, RenderError::Launch(_)), "got {err:?}");
    }

    #[test]
    fn test_print_params_are_a4_without_margins() {
        let params = print_params(&RenderOptions::default());
        assert_eq!(params.paper_width, Some(8.27));
        assert_eq!(params.paper_height, Some(11.69));
        assert_eq!(params.margin_top, Some(0.0));
        assert_eq!(params.margin_left, Some(0.0));
        assert_eq!(params.print_background, Some(true));
        assert_eq!(params.display_header_footer, Some(false));
    }

    #[test]
    fn test_print_params_convert_margin_to_inches() {
        let options = RenderOptions {
            margin_px: 48,
            ..RenderOptions::default()
        };
        assert_eq!(print_params(&options).margin_bottom, Some(0.5));
    }
}
