use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// Emitted whenever the HTML report has been regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportUpdated {
    pub path: PathBuf,
    pub displayed: usize,
    pub total: usize,
}

/// Something that reacts to report regeneration (e.g. a browser preview).
#[async_trait::async_trait]
pub trait ReportListener: Send + Sync {
    fn name(&self) -> &str;
    async fn report_updated(&self, event: &ReportUpdated) -> Result<()>;
}

/// Fan-out of report events to registered listeners.
///
/// Listener failures are collected as warnings and never propagated.
#[derive(Default, Clone)]
pub struct ReportEvents {
    listeners: Vec<Arc<dyn ReportListener>>,
}

impl ReportEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn ReportListener>) {
        log::info!("Report listener registered: {}", listener.name());
        self.listeners.push(listener);
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener, returning one message per failure.
    pub async fn publish(&self, event: &ReportUpdated) -> Vec<String> {
        let mut warnings = Vec::new();
        for listener in &self.listeners {
            if let Err(e) = listener.report_updated(event).await {
                log::warn!("Report listener '{}' failed: {}", listener.name(), e);
                warnings.push(e.to_string());
            }
        }
        warnings
    }
}
