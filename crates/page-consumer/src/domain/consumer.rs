use async_trait::async_trait;
use event_dispatch::Message;
use tokio::sync::mpsc;

#[async_trait]
pub trait EventConsumer: Send + Sync + 'static {
    async fn consume(&self, ch: mpsc::Receiver<Message>);
}
