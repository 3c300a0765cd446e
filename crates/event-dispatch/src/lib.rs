pub mod ack;
pub mod commit;
pub mod config;
pub mod dead_letter;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod registry;
pub mod retry;

pub use ack::AckTracker;
pub use commit::{Committer, MemoryCommitter};
pub use config::DispatchConfig;
pub use dead_letter::{DeadLetter, DeadLetterSink, MemoryDeadLetterSink};
pub use decoder::{EventDecoder, TopicDecoder};
pub use dispatcher::{Completion, DispatchStats, Dispatcher, StatsSnapshot};
pub use error::{ConfigError, DecodeError, DispatchError};
pub use message::{Message, Outcome, TopicPartition};
pub use registry::{Event, Handler, HandlerRegistry};
pub use retry::RetryPolicy;
