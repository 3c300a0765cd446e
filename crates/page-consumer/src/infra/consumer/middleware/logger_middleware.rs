use async_trait::async_trait;
use event_dispatch::{Event, Handler};
use tracing::{debug, error};

pub struct LoggingMiddleware<H> {
    inner: H,
}

impl<H> LoggingMiddleware<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: Event, H: Handler<E>> Handler<E> for LoggingMiddleware<H> {
    async fn handle(&self, event: &E) -> anyhow::Result<()> {
        debug!(event_type = event.event_type(), "{:?}", event);
        let res = self.inner.handle(event).await;
        if let Err(e) = &res {
            error!(event_type = event.event_type(), "{:#}", e);
        }

        res
    }
}
