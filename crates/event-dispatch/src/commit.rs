use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::message::TopicPartition;

/// Offset commit seam supplied by the broker client.
///
/// `offset` is the last completed offset on the partition. Brokers that store
/// the next offset to read must add one themselves.
#[async_trait]
pub trait Committer: Send + Sync + 'static {
    async fn commit(&self, tp: &TopicPartition, offset: i64) -> anyhow::Result<()>;
}

/// Keeps the latest commit per partition plus the full commit history.
#[derive(Debug, Default)]
pub struct MemoryCommitter {
    commits: Mutex<Vec<(TopicPartition, i64)>>,
}

impl MemoryCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self, tp: &TopicPartition) -> Option<i64> {
        self.commits
            .lock()
            .iter()
            .rev()
            .find(|(t, _)| t == tp)
            .map(|(_, offset)| *offset)
    }

    pub fn history(&self) -> Vec<(TopicPartition, i64)> {
        self.commits.lock().clone()
    }

    pub fn latest(&self) -> HashMap<TopicPartition, i64> {
        self.commits.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl Committer for MemoryCommitter {
    async fn commit(&self, tp: &TopicPartition, offset: i64) -> anyhow::Result<()> {
        self.commits.lock().push((tp.clone(), offset));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_committer_keeps_latest() {
        let committer = MemoryCommitter::new();
        let a = TopicPartition::new("t", 0);
        let b = TopicPartition::new("t", 1);

        committer.commit(&a, 1).await.unwrap();
        committer.commit(&b, 9).await.unwrap();
        committer.commit(&a, 4).await.unwrap();

        assert_eq!(committer.committed(&a), Some(4));
        assert_eq!(committer.committed(&b), Some(9));
        assert_eq!(committer.history().len(), 3);
        assert_eq!(committer.latest().get(&a), Some(&4));
    }
}
