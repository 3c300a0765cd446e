use async_trait::async_trait;
use event_dispatch::Handler;
use tokio::io::{AsyncWriteExt, Stdout, stdout};
use tokio::sync::Mutex;

use crate::domain::models::ConsumerEvent;

const BANNER: &str = "*****************";

/// Default handler: prints every page event to stdout between banners.
pub struct PageEventHandler {
    out: Mutex<Stdout>,
}

impl PageEventHandler {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(stdout()),
        }
    }
}

impl Default for PageEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn render(event: &ConsumerEvent) -> String {
    let body = match event {
        ConsumerEvent::Page(page) => page.to_string(),
    };
    format!("{BANNER}\n{body}\n{BANNER}\n")
}

#[async_trait]
impl Handler<ConsumerEvent> for PageEventHandler {
    async fn handle(&self, event: &ConsumerEvent) -> anyhow::Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(render(event).as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}
