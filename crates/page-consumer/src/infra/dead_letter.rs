use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_dispatch::{DeadLetterSink, Message};
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};

/// One line of the dead-letter file. Keeps enough metadata to replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    fn new(message: &Message, reason: &str) -> Self {
        Self {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            key: message.key_lossy(),
            payload: String::from_utf8_lossy(&message.payload).into_owned(),
            timestamp: message.timestamp,
            reason: reason.to_string(),
            dead_lettered_at: Utc::now(),
        }
    }
}

/// Appends dead letters as JSON lines.
pub struct FileDeadLetterSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileDeadLetterSink {
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening dead-letter file {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DeadLetterSink for FileDeadLetterSink {
    async fn send(&self, message: &Message, reason: &str) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&DeadLetterRecord::new(message, reason))?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .with_context(|| format!("writing to {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}
