use async_trait::async_trait;
use parking_lot::Mutex;

use crate::message::Message;

/// Destination for messages that could not be processed.
#[async_trait]
pub trait DeadLetterSink: Send + Sync + 'static {
    async fn send(&self, message: &Message, reason: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub message: Message,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct MemoryDeadLetterSink {
    entries: Mutex<Vec<DeadLetter>>,
}

impl MemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries.lock().clone()
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.entries.lock().iter().map(|e| e.message.offset).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetterSink {
    async fn send(&self, message: &Message, reason: &str) -> anyhow::Result<()> {
        self.entries.lock().push(DeadLetter {
            message: message.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }
}
