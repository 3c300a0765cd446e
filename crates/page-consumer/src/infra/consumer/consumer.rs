use std::sync::Arc;

use async_trait::async_trait;
use event_dispatch::{Dispatcher, EventDecoder, Message};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{core::Shutdowner, domain::consumer::EventConsumer};

pub struct Consumer<D: EventDecoder> {
    dispatcher: Arc<Dispatcher<D>>,
    cancel_token: CancellationToken,
}

impl<D: EventDecoder> Consumer<D> {
    pub fn new(dispatcher: Dispatcher<D>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            cancel_token: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl<D: EventDecoder> EventConsumer for Consumer<D> {
    async fn consume(&self, ch: mpsc::Receiver<Message>) {
        let stats = self
            .dispatcher
            .clone()
            .run(ReceiverStream::new(ch), self.cancel_token.clone())
            .await;

        info!(
            received = stats.received,
            processed = stats.processed,
            skipped = stats.skipped,
            failed = stats.failed,
            dead_lettered = stats.dead_lettered,
            "consumer finished"
        );
    }
}

#[async_trait]
impl<D: EventDecoder> Shutdowner for Consumer<D> {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.cancel_token.cancel();
        Ok(())
    }
}
