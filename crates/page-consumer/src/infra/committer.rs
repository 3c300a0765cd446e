use std::collections::HashMap;

use async_trait::async_trait;
use event_dispatch::{Committer, TopicPartition};
use tokio::sync::Mutex;
use tracing::info;

/// Committer for sources without a broker-side offset store: logs each
/// commit and remembers the position per partition.
#[derive(Default)]
pub struct LoggingCommitter {
    positions: Mutex<HashMap<TopicPartition, i64>>,
}

impl LoggingCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next offset to read per partition, broker style.
    pub async fn positions(&self) -> HashMap<TopicPartition, i64> {
        self.positions
            .lock()
            .await
            .iter()
            .map(|(tp, offset)| (tp.clone(), offset + 1))
            .collect()
    }
}

#[async_trait]
impl Committer for LoggingCommitter {
    async fn commit(&self, tp: &TopicPartition, offset: i64) -> anyhow::Result<()> {
        info!(partition = %tp, offset, next = offset + 1, "committing offset");
        self.positions.lock().await.insert(tp.clone(), offset);
        Ok(())
    }
}
