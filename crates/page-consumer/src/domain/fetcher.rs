use async_trait::async_trait;
use event_dispatch::Message;
use tokio::sync::mpsc;

/// Stand-in for the broker client: yields raw messages in partition order.
#[async_trait]
pub trait MessageFetcher: Send + Sync + 'static {
    async fn fetch(&self) -> anyhow::Result<mpsc::Receiver<Message>>;
}
