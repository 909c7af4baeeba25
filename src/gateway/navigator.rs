use std::sync::Mutex;

use tracing::info;

/// Seam for moving the user to another location.
///
/// The gateway uses it to send the user back to the entry point when the
/// session cannot be recovered; the callback handler uses it after a
/// redirect has been reconciled.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Navigator that only records the request in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, target: &str) {
        info!(target, "Navigation requested");
    }
}

/// Navigator that remembers every target, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits
            .lock()
            .map(|visits| visits.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.visits().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        if let Ok(mut visits) = self.visits.lock() {
            visits.push(target.to_string());
        }
    }
}
