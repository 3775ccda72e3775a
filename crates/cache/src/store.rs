//! Durable answer store
//!
//! In-memory LRU map in front of an append-only JSON log. Every put is
//! appended through a background writer that syncs the log at most one
//! second behind; a snapshot is written atomically (tmp + rename) every
//! `snapshot_every` writes and the log truncated. Opening the store loads
//! the snapshot and replays the log, so entries survive restarts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

use climate_chat_config::CacheSettings;
use climate_chat_core::{Answer, AnswerCache, FeedbackRecord, Result};

use crate::feedback::FeedbackLog;
use crate::CacheError;

const AOF_FILE: &str = "answers.aof";
const SNAPSHOT_FILE: &str = "answers.snapshot.json";
const FEEDBACK_FILE: &str = "feedback.aof";

/// Store configuration
#[derive(Debug, Clone)]
pub struct AnswerStoreConfig {
    /// Directory holding the log and snapshots
    pub dir: PathBuf,
    /// Approximate in-memory bound (bytes)
    pub max_bytes: usize,
    /// Snapshot after this many writes
    pub snapshot_every: u64,
    /// Maximum lag between a write and its durable sync
    pub sync_interval: Duration,
}

impl Default for AnswerStoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/cache"),
            max_bytes: climate_chat_config::constants::limits::CACHE_MAX_BYTES,
            snapshot_every: climate_chat_config::constants::limits::CACHE_SNAPSHOT_EVERY,
            sync_interval: Duration::from_secs(1),
        }
    }
}

impl From<&CacheSettings> for AnswerStoreConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            dir: PathBuf::from(&settings.dir),
            max_bytes: settings.max_bytes,
            snapshot_every: settings.snapshot_every,
            sync_interval: Duration::from_secs(1),
        }
    }
}

/// One persisted entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub answer: Answer,
    pub stored_at: DateTime<Utc>,
}

enum WriterMsg {
    Append(String),
    Snapshot(String),
    Clear,
    Sync(oneshot::Sender<()>),
}

struct StoreInner {
    /// Unbounded LRU; eviction is driven by the byte accounting below.
    map: LruCache<String, (CacheEntry, usize)>,
    bytes: usize,
    writes_since_snapshot: u64,
}

impl StoreInner {
    fn insert(&mut self, entry: CacheEntry, size: usize, max_bytes: usize) {
        if let Some((_, old_size)) = self.map.pop(&entry.key) {
            self.bytes = self.bytes.saturating_sub(old_size);
        }
        self.bytes += size;
        self.map.put(entry.key.clone(), (entry, size));

        while self.bytes > max_bytes && self.map.len() > 1 {
            if let Some((evicted_key, (_, evicted_size))) = self.map.pop_lru() {
                self.bytes = self.bytes.saturating_sub(evicted_size);
                tracing::debug!(key = %evicted_key, "evicted cache entry under memory pressure");
            } else {
                break;
            }
        }
    }

    fn snapshot_entries(&self) -> Vec<CacheEntry> {
        self.map.iter().map(|(_, (entry, _))| entry.clone()).collect()
    }
}

/// Durable, fingerprint-keyed answer store
pub struct AnswerStore {
    inner: Arc<Mutex<StoreInner>>,
    writer_tx: mpsc::UnboundedSender<WriterMsg>,
    feedback: FeedbackLog,
    config: AnswerStoreConfig,
}

impl AnswerStore {
    /// Open (or create) the store under `config.dir`, loading the snapshot
    /// and replaying the append log.
    pub async fn open(config: AnswerStoreConfig) -> std::result::Result<Self, CacheError> {
        fs::create_dir_all(&config.dir).await?;

        let mut inner = StoreInner {
            map: LruCache::unbounded(),
            bytes: 0,
            writes_since_snapshot: 0,
        };

        for entry in load_entries(&config.dir).await? {
            let size = serde_json::to_string(&entry)?.len();
            inner.insert(entry, size, config.max_bytes);
        }

        let loaded = inner.map.len();
        if loaded > 0 {
            tracing::info!(entries = loaded, "answer cache restored from disk");
        }

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(
            config.dir.join(AOF_FILE),
            config.dir.join(SNAPSHOT_FILE),
            writer_rx,
            config.sync_interval,
        ));

        let feedback = FeedbackLog::open(config.dir.join(FEEDBACK_FILE));

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            writer_tx,
            feedback,
            config,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operator flush: drop every entry and truncate the on-disk state.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.bytes = 0;
        inner.writes_since_snapshot = 0;
        drop(inner);
        let _ = self.writer_tx.send(WriterMsg::Clear);
    }

    /// Force the append log to durable storage. Used at shutdown and by
    /// the restart tests; normal operation relies on the 1 s sync cadence.
    pub async fn sync(&self) -> std::result::Result<(), CacheError> {
        let (tx, rx) = oneshot::channel();
        self.writer_tx
            .send(WriterMsg::Sync(tx))
            .map_err(|_| CacheError::Closed)?;
        rx.await.map_err(|_| CacheError::Closed)
    }
}

#[async_trait]
impl AnswerCache for AnswerStore {
    async fn get(&self, key: &str) -> Result<Option<Answer>> {
        let mut inner = self.inner.lock();
        Ok(inner.map.get(key).map(|(entry, _)| entry.answer.clone()))
    }

    async fn put(&self, key: &str, answer: &Answer) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            answer: answer.clone(),
            stored_at: Utc::now(),
        };
        let line = serde_json::to_string(&entry).map_err(CacheError::from)?;
        let size = line.len();

        let snapshot = {
            let mut inner = self.inner.lock();
            inner.insert(entry, size, self.config.max_bytes);
            inner.writes_since_snapshot += 1;
            if inner.writes_since_snapshot >= self.config.snapshot_every {
                inner.writes_since_snapshot = 0;
                Some(inner.snapshot_entries())
            } else {
                None
            }
        };

        self.writer_tx
            .send(WriterMsg::Append(line))
            .map_err(|_| CacheError::Closed)?;

        if let Some(entries) = snapshot {
            let json = serde_json::to_string(&entries).map_err(CacheError::from)?;
            let _ = self.writer_tx.send(WriterMsg::Snapshot(json));
        }
        Ok(())
    }

    async fn put_feedback(&self, record: FeedbackRecord) -> Result<()> {
        self.feedback.append(&record)?;
        Ok(())
    }
}

async fn load_entries(dir: &Path) -> std::result::Result<Vec<CacheEntry>, CacheError> {
    let mut entries = Vec::new();

    let snapshot_path = dir.join(SNAPSHOT_FILE);
    if snapshot_path.exists() {
        let json = fs::read_to_string(&snapshot_path).await?;
        match serde_json::from_str::<Vec<CacheEntry>>(&json) {
            Ok(mut snapshot) => entries.append(&mut snapshot),
            Err(err) => {
                tracing::warn!(error = %err, "snapshot unreadable, relying on append log");
            }
        }
    }

    let aof_path = dir.join(AOF_FILE);
    if aof_path.exists() {
        let log = fs::read_to_string(&aof_path).await?;
        for line in log.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<CacheEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    // A torn tail write after a crash is expected; skip it.
                    tracing::warn!(error = %err, "skipping unreadable log line");
                }
            }
        }
    }

    Ok(entries)
}

async fn run_writer(
    aof_path: PathBuf,
    snapshot_path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<WriterMsg>,
    sync_interval: Duration,
) {
    let mut file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&aof_path)
        .await
    {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(error = %err, path = %aof_path.display(), "cannot open append log");
            return;
        }
    };

    let mut interval = tokio::time::interval(sync_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut dirty = false;

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                None => {
                    if dirty {
                        let _ = file.sync_data().await;
                    }
                    break;
                }
                Some(WriterMsg::Append(line)) => {
                    if let Err(err) = write_line(&mut file, &line).await {
                        tracing::warn!(error = %err, "append log write failed");
                    } else {
                        dirty = true;
                    }
                }
                Some(WriterMsg::Snapshot(json)) => {
                    if let Err(err) = write_snapshot(&snapshot_path, &json).await {
                        tracing::warn!(error = %err, "snapshot write failed");
                        continue;
                    }
                    // The snapshot now covers everything in the log.
                    if let Err(err) = file.set_len(0).await {
                        tracing::warn!(error = %err, "log truncation failed");
                    }
                    dirty = false;
                }
                Some(WriterMsg::Clear) => {
                    let _ = file.set_len(0).await;
                    let _ = fs::remove_file(&snapshot_path).await;
                    dirty = false;
                }
                Some(WriterMsg::Sync(ack)) => {
                    let _ = file.sync_data().await;
                    dirty = false;
                    let _ = ack.send(());
                }
            },
            _ = interval.tick(), if dirty => {
                let _ = file.sync_data().await;
                dirty = false;
            }
        }
    }
}

async fn write_line(file: &mut tokio::fs::File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await
}

async fn write_snapshot(path: &Path, json: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use climate_chat_core::{ModelFamily, RetrievalSource};

    fn answer(text: &str) -> Answer {
        Answer {
            text: text.to_string(),
            language_code: "en".to_string(),
            model_family: Some(ModelFamily::HighQuality),
            citations: vec![],
            faithfulness_score: 0.9,
            retrieval_source: RetrievalSource::Vector,
            processing_time_ms: 100,
        }
    }

    fn config(dir: &Path) -> AnswerStoreConfig {
        AnswerStoreConfig {
            dir: dir.to_path_buf(),
            max_bytes: 1024 * 1024,
            snapshot_every: 4,
            sync_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_get_put_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnswerStore::open(config(dir.path())).await.unwrap();

        assert!(store.get("q:en:abc").await.unwrap().is_none());
        store.put("q:en:abc", &answer("the poles warm fastest")).await.unwrap();

        let cached = store.get("q:en:abc").await.unwrap().unwrap();
        assert_eq!(cached.text, "the poles warm fastest");
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = AnswerStore::open(config(dir.path())).await.unwrap();
            store.put("q:en:k1", &answer("sea levels rise")).await.unwrap();
            store.sync().await.unwrap();
        }

        let reopened = AnswerStore::open(config(dir.path())).await.unwrap();
        let cached = reopened.get("q:en:k1").await.unwrap().unwrap();
        assert_eq!(cached.text, "sea levels rise");
    }

    #[tokio::test]
    async fn test_snapshot_plus_log_replay() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = AnswerStore::open(config(dir.path())).await.unwrap();
            // snapshot_every = 4: five puts force a snapshot plus one log line.
            for i in 0..5 {
                store
                    .put(&format!("q:en:k{i}"), &answer(&format!("answer {i}")))
                    .await
                    .unwrap();
            }
            store.sync().await.unwrap();
        }

        let reopened = AnswerStore::open(config(dir.path())).await.unwrap();
        assert_eq!(reopened.len(), 5);
        for i in 0..5 {
            assert!(reopened.get(&format!("q:en:k{i}")).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_lru_eviction_under_byte_bound() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.max_bytes = 600;
        let store = AnswerStore::open(cfg).await.unwrap();

        for i in 0..10 {
            store
                .put(&format!("q:en:k{i}"), &answer(&format!("answer {i}")))
                .await
                .unwrap();
        }

        assert!(store.len() < 10);
        // The most recent entry is never the one evicted.
        assert!(store.get("q:en:k9").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_empties_store_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = AnswerStore::open(config(dir.path())).await.unwrap();
            store.put("q:en:k1", &answer("x")).await.unwrap();
            store.clear();
            store.sync().await.unwrap();
            assert!(store.is_empty());
        }

        let reopened = AnswerStore::open(config(dir.path())).await.unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn test_torn_log_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = AnswerStore::open(config(dir.path())).await.unwrap();
            store.put("q:en:good", &answer("kept")).await.unwrap();
            store.sync().await.unwrap();
        }

        // Simulate a crash mid-append.
        let aof = dir.path().join(AOF_FILE);
        let mut contents = std::fs::read_to_string(&aof).unwrap();
        contents.push_str("{\"key\":\"q:en:torn\",\"answ");
        std::fs::write(&aof, contents).unwrap();

        let reopened = AnswerStore::open(config(dir.path())).await.unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("q:en:good").await.unwrap().is_some());
    }
}
