pub mod committer;
pub mod config;
pub mod consumer;
pub mod dead_letter;
pub mod fetchers;
pub mod logging;
pub mod signal;

pub use committer::LoggingCommitter;
pub use config::{Config, Settings};
pub use dead_letter::FileDeadLetterSink;
pub use fetchers::JsonLinesFetcher;
pub use logging::LogGuard;
pub use signal::UnixSignalHandler;
