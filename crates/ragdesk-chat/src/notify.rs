use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ragdesk_core::traits::NotificationSink;
use ragdesk_core::types::EscalationNotice;
use ragdesk_core::{Error, Result};
use serde::Serialize;
use tracing::{info, warn};

/// Emits the notice as a tracing event only.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notice: &EscalationNotice) -> Result<()> {
        warn!(user_id = %notice.user_id, subject = %notice.subject(), "escalation requested, no outbox configured");
        info!(body = %notice.body(), "escalation notice");
        Ok(())
    }
}

#[derive(Serialize)]
struct OutboxLine<'a> {
    created_at: String,
    subject: String,
    body: String,
    #[serde(flatten)]
    notice: &'a EscalationNotice,
}

/// Appends one JSON line per notice to a file drained by an external mailer.
pub struct OutboxNotifier {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl NotificationSink for OutboxNotifier {
    fn notify(&self, notice: &EscalationNotice) -> Result<()> {
        let line = serde_json::to_string(&OutboxLine {
            created_at: chrono::Utc::now().to_rfc3339(),
            subject: notice.subject(),
            body: notice.body(),
            notice,
        })?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::NotificationFailure("outbox lock poisoned".into()))?;
        self.append(&line)
            .map_err(|e| Error::NotificationFailure(format!("{}: {e}", self.path.display())))?;
        info!(user_id = %notice.user_id, outbox = %self.path.display(), "escalation queued");
        Ok(())
    }
}
