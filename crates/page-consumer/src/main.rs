mod core;
mod domain;
mod infra;

use std::{io::ErrorKind, sync::Arc};

use event_dispatch::{Dispatcher, HandlerRegistry};
use infra::{
    Config, FileDeadLetterSink, JsonLinesFetcher, LogGuard, LoggingCommitter, Settings,
    UnixSignalHandler,
};
use tracing::info;

use crate::{
    core::App,
    domain::models::{ConsumerEvent, Route},
    infra::consumer::{Consumer, LoggingMiddleware, PageEventHandler, page_decoder},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_config()?;
    let _log_guard = LogGuard::init()?;

    let config = Config::new();
    let settings = Settings::load(&config)?;

    let registry = HandlerRegistry::<ConsumerEvent>::new().with(
        Route::Page.as_str(),
        Arc::new(LoggingMiddleware::new(PageEventHandler::new())),
    )?;

    let dead_letter = FileDeadLetterSink::open(&settings.dead_letter_path).await?;
    info!(
        input = ?settings.input,
        topic = %settings.page_topic,
        dead_letter = %dead_letter.path().display(),
        "starting page consumer"
    );

    let committer = Arc::new(LoggingCommitter::new());
    let dispatcher = Dispatcher::new(
        page_decoder(&settings.page_topic),
        registry,
        Arc::new(dead_letter),
        committer.clone(),
        settings.dispatch.clone(),
    )?;

    let consumer = Consumer::new(dispatcher);
    let fetcher = JsonLinesFetcher::new(settings.input.clone());
    let app = App::new(UnixSignalHandler::new(), fetcher, consumer);

    app.run().await?;

    for (tp, next) in committer.positions().await {
        info!(partition = %tp, next, "final position");
    }
    Ok(())
}

/// Loads `./config` into the environment when present.
fn load_config() -> anyhow::Result<()> {
    match dotenv::from_path("./config") {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
