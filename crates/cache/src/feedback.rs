//! Feedback log
//!
//! Append-only record of user feedback on answers. Writes go through an
//! unbounded channel to a background appender, so the request path never
//! blocks on feedback persistence.

use std::path::PathBuf;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use climate_chat_core::FeedbackRecord;

use crate::CacheError;

/// Fire-and-forget feedback appender
pub struct FeedbackLog {
    tx: mpsc::UnboundedSender<String>,
}

impl FeedbackLog {
    /// Open the log, spawning the background appender.
    pub fn open(path: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_appender(path, rx));
        Self { tx }
    }

    /// Enqueue one record. Returns an error only if the appender is gone.
    pub fn append(&self, record: &FeedbackRecord) -> Result<(), CacheError> {
        let line = serde_json::to_string(record)?;
        self.tx.send(line).map_err(|_| CacheError::Closed)
    }
}

async fn run_appender(path: PathBuf, mut rx: mpsc::UnboundedReceiver<String>) {
    let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(error = %err, path = %path.display(), "cannot open feedback log");
            return;
        }
    };

    while let Some(line) = rx.recv().await {
        if let Err(err) = file.write_all(format!("{line}\n").as_bytes()).await {
            tracing::warn!(error = %err, "feedback append failed");
        }
    }
    let _ = file.sync_data().await;
}
