use async_trait::async_trait;
use tokio::signal::unix::{SignalKind, signal};
use tracing::warn;

use crate::core::{ShutdownKind, SignalHandler};

pub struct UnixSignalHandler;

impl Default for UnixSignalHandler {
    fn default() -> Self {
        Self
    }
}

impl UnixSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SignalHandler for UnixSignalHandler {
    async fn wait_for_shutdown(&self) -> ShutdownKind {
        let (Ok(mut sigterm), Ok(mut sigint), Ok(mut sighup)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) else {
            warn!("unix signal handlers unavailable, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            return ShutdownKind::Interrupt;
        };

        tokio::select! {
            _ = sigterm.recv() => ShutdownKind::Terminate,
            _ = sigint.recv() => ShutdownKind::Interrupt,
            _ = sighup.recv() => ShutdownKind::Hangup,
        }
    }
}
