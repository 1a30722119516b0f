use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Lifecycle notifications raised by apps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AppEventKind {
    DownloadStarted,
    DownloadProgressed { transferred: u64, total: Option<u64> },
    DownloadFinished,
    DownloadFailed { reason: String },
    InstallStarted,
    InstallFinished,
    InstallFailed { reason: String },
    ConfigurationRequired { reason: String },
    StartFailed { reason: String },
}

impl AppEventKind {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AppEventKind::DownloadFailed { .. }
                | AppEventKind::InstallFailed { .. }
                | AppEventKind::StartFailed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppEvent {
    pub app: String,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AppEventKind,
}

/// Sending half of the single outbound event channel.
///
/// Cloned into every worker; delivery is best effort once the receiver is gone.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Option<Sender<AppEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, Receiver<AppEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Sink that drops every event.
    pub fn disconnected() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, app: &str, kind: AppEventKind) {
        let event = AppEvent {
            app: app.to_string(),
            at: Utc::now(),
            kind,
        };
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(event).is_err() {
            debug!(app, "event receiver dropped");
        }
    }
}
