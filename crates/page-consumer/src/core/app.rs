use std::{sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{error, info};

use crate::{
    core::{Shutdowner, SignalHandler},
    domain::{consumer::EventConsumer, fetcher::MessageFetcher},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct App<S, F, C> {
    signal_handler: S,
    fetcher: F,
    consumer: C,
}

impl<S, F, C> App<S, F, C>
where
    S: SignalHandler,
    F: MessageFetcher + Shutdowner,
    C: EventConsumer + Shutdowner,
{
    pub fn new(signal_handler: S, fetcher: F, consumer: C) -> Self {
        Self {
            signal_handler,
            fetcher,
            consumer,
        }
    }

    /// Runs until a shutdown signal arrives or the input is exhausted.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("app running...");

        let Self {
            signal_handler,
            fetcher,
            consumer,
        } = self;

        let consumer = Arc::new(consumer);
        let message_ch = fetcher.fetch().await?;
        let mut handle = tokio::spawn({
            let consumer = consumer.clone();
            async move {
                consumer.consume(message_ch).await;
            }
        });

        let finished = tokio::select! {
            signal = signal_handler.wait_for_shutdown() => {
                info!("received signal {}, stopping", signal);
                None
            }
            res = &mut handle => Some(res),
        };

        fetcher.shutdown().await?;
        consumer.shutdown().await?;

        match finished {
            Some(res) => {
                res?;
                info!("input drained, shutdown complete");
            }
            None => match timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(res) => {
                    info!("graceful shutdown complete");
                    res?;
                }
                Err(_) => {
                    error!("shutdown timeout exceeded, forcing exit");
                }
            },
        }

        Ok(())
    }
}
