use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::PreviewConfig;
use crate::error::{NoteError, Result};
use crate::events::{ReportListener, ReportUpdated};
use crate::webdriver::{BrowserOptions, WebDriverClient};

/// Keeps a browser window pointed at the latest report.
///
/// The session is started lazily and dropped whenever a call against it
/// fails, so the next report starts a fresh one.
pub struct PreviewNotifier {
    driver: WebDriverClient,
    options: BrowserOptions,
    settle: Duration,
    session: Mutex<Option<String>>,
}

impl PreviewNotifier {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            driver: WebDriverClient::new(config.webdriver_url.clone()),
            options: BrowserOptions {
                browser: config.browser.clone(),
                args: config.args.clone(),
            },
            settle: Duration::from_millis(config.settle_ms),
            session: Mutex::new(None),
        }
    }

    /// Open `path` in the browser, or reload it if it is already showing.
    pub async fn show(&self, path: &Path) -> Result<()> {
        let target = file_url(path)?;
        let mut session = self.session.lock().await;

        let (session_id, current_url) = match session.clone() {
            Some(id) => match self.driver.current_url(&id).await {
                Ok(url) => (id, url),
                Err(e) => {
                    log::warn!("Browser session lost, starting a new one: {:#}", e);
                    *session = None;
                    (self.start(&mut *session).await?, String::new())
                }
            },
            None => (self.start(&mut *session).await?, String::new()),
        };

        let result = if current_url == target {
            self.driver.refresh(&session_id).await
        } else {
            self.driver.navigate(&session_id, &target).await
        };

        match result {
            Ok(()) => {
                if current_url == target {
                    log::info!("Notes page refreshed");
                } else {
                    log::info!("Notes page opened: {}", target);
                }
                if !self.settle.is_zero() {
                    tokio::time::sleep(self.settle).await;
                }
                Ok(())
            }
            Err(e) => {
                log::error!("Browser operation failed: {:#}", e);
                *session = None;
                Err(NoteError::PreviewUnavailable(format!(
                    "browser operation failed: {:#}",
                    e
                )))
            }
        }
    }

    /// End the browser session, if one is open.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        if let Some(id) = session.take() {
            match self.driver.delete_session(&id).await {
                Ok(()) => log::info!("Browser session closed"),
                Err(e) => log::error!("Failed to close browser session: {:#}", e),
            }
        }
    }

    async fn start(&self, slot: &mut Option<String>) -> Result<String> {
        let id = self.driver.new_session(&self.options).await.map_err(|e| {
            log::error!("Failed to start {}: {:#}", self.options.browser, e);
            NoteError::PreviewUnavailable(format!(
                "could not start {} via {}: {:#}",
                self.options.browser, self.driver.endpoint, e
            ))
        })?;
        log::info!("{} session started ({})", self.options.browser, id);
        *slot = Some(id.clone());
        Ok(id)
    }
}

#[async_trait::async_trait]
impl ReportListener for PreviewNotifier {
    fn name(&self) -> &str {
        "browser-preview"
    }

    async fn report_updated(&self, event: &ReportUpdated) -> Result<()> {
        log::debug!("Previewing {} of {} notes", event.displayed, event.total);
        self.show(&event.path).await
    }
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = std::fs::canonicalize(path).map_err(|e| NoteError::io(path, e))?;
    reqwest::Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| {
            NoteError::PreviewUnavailable(format!(
                "cannot build file URL for {}",
                absolute.display()
            ))
        })
}
