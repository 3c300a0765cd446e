use std::io::{self, BufRead};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_dispatch::Message;
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{core::Shutdowner, domain::fetcher::MessageFetcher, infra::config::InputSource};

const CHANNEL_BUFFER_SIZE: usize = 100;

/// Raw newline-separated segments of the input, in order.
type Segments = mpsc::Receiver<io::Result<Vec<u8>>>;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("negative offset {0}")]
    NegativeOffset(i64),
}

/// Broker record as written by the export tooling, one per line.
///
/// A string `payload` is taken verbatim so undecodable records can be
/// replayed as-is; any other JSON value is re-serialized.
#[derive(Debug, Deserialize)]
struct Envelope {
    topic: String,
    #[serde(default)]
    partition: i32,
    offset: i64,
    #[serde(default)]
    key: Option<String>,
    payload: serde_json::Value,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

pub fn parse_line(line: &str) -> Result<Option<Message>, EnvelopeError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let envelope: Envelope = serde_json::from_str(line)?;
    if envelope.offset < 0 {
        return Err(EnvelopeError::NegativeOffset(envelope.offset));
    }

    let payload = match envelope.payload {
        serde_json::Value::String(raw) => raw.into_bytes(),
        other => serde_json::to_vec(&other)?,
    };

    let mut message = Message::new(envelope.topic, envelope.partition, envelope.offset, payload);
    if let Some(key) = envelope.key {
        message = message.with_key(key.into_bytes());
    }
    if let Some(timestamp) = envelope.timestamp {
        message = message.with_timestamp(timestamp);
    }

    Ok(Some(message))
}

pub struct JsonLinesFetcher {
    source: InputSource,
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl JsonLinesFetcher {
    pub fn new(source: InputSource) -> Self {
        Self {
            source,
            cancel_token: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    async fn open(&self) -> anyhow::Result<Segments> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        match &self.source {
            // tokio's stdin holds runtime shutdown until the next line arrives, so
            // stdin is read on a detached thread that is abandoned on exit.
            InputSource::Stdin => {
                std::thread::Builder::new()
                    .name("stdin-reader".into())
                    .spawn(move || {
                        for segment in io::stdin().lock().split(b'\n') {
                            let failed = segment.is_err();
                            if tx.blocking_send(segment).is_err() || failed {
                                break;
                            }
                        }
                    })
                    .context("spawning stdin reader")?;
            }
            InputSource::File(path) => {
                let file = File::open(path)
                    .await
                    .with_context(|| format!("opening input {}", path.display()))?;
                let mut segments = BufReader::new(file).split(b'\n');

                tokio::spawn(async move {
                    while let Some(segment) = segments.next_segment().await.transpose() {
                        let failed = segment.is_err();
                        if tx.send(segment).await.is_err() || failed {
                            break;
                        }
                    }
                });
            }
        }

        Ok(rx)
    }
}

#[async_trait]
impl Shutdowner for JsonLinesFetcher {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            handle.await?;
        }
        Ok(())
    }
}

impl Drop for JsonLinesFetcher {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[async_trait]
impl MessageFetcher for JsonLinesFetcher {
    async fn fetch(&self) -> anyhow::Result<mpsc::Receiver<Message>> {
        let mut segments = self.open().await?;
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let cancellation_token = self.cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut line_no = 0usize;

            loop {
                tokio::select! {
                    biased;

                    _ = cancellation_token.cancelled() => {
                        info!("fetcher cancelled, stopping...");
                        break
                    }

                    next = segments.recv() => {
                        let bytes = match next {
                            Some(Ok(bytes)) => bytes,
                            None => {
                                info!(lines = line_no, "input exhausted");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("input read failed: {}", e);
                                break;
                            }
                        };
                        line_no += 1;

                        let line = match String::from_utf8(bytes) {
                            Ok(line) => line,
                            Err(e) => {
                                warn!(line = line_no, "skipping non-UTF-8 line: {}", e.utf8_error());
                                continue;
                            }
                        };

                        let message = match parse_line(&line) {
                            Ok(Some(message)) => message,
                            Ok(None) => continue,
                            Err(e) => {
                                warn!(line = line_no, "skipping line: {}", e);
                                continue;
                            }
                        };

                        tokio::select! {
                            biased;

                            _ = cancellation_token.cancelled() => break,

                            res = tx.send(message) => {
                                if res.is_err() {
                                    info!("receiver dropped");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        *self.handle.lock().await = Some(handle);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_object_payload() {
        let line = r#"{"topic":"page-events","partition":2,"offset":7,"key":"u1","payload":{"name":"P1","user":"U1","date":0,"duration":3},"timestamp":"2024-03-01T10:00:00Z"}"#;
        let message = parse_line(line).unwrap().unwrap();

        assert_eq!(message.topic, "page-events");
        assert_eq!(message.partition, 2);
        assert_eq!(message.offset, 7);
        assert_eq!(message.key_lossy().as_deref(), Some("u1"));
        assert_eq!(message.timestamp.to_rfc3339(), "2024-03-01T10:00:00+00:00");

        let payload: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(payload["name"], "P1");
    }

    #[test]
    fn test_string_payload_is_verbatim() {
        let line = r#"{"topic":"page-events","offset":1,"payload":"{not json"}"#;
        let message = parse_line(line).unwrap().unwrap();

        assert_eq!(message.partition, 0);
        assert_eq!(message.payload, b"{not json");
        assert_eq!(message.key, None);
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert!(parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn test_invalid_envelope() {
        assert!(matches!(parse_line("hello"), Err(EnvelopeError::Json(_))));
        assert!(matches!(
            parse_line(r#"{"topic":"t","payload":{}}"#),
            Err(EnvelopeError::Json(_))
        ));
    }

    #[test]
    fn test_negative_offset_rejected() {
        let line = r#"{"topic":"t","offset":-1,"payload":{}}"#;
        assert!(matches!(
            parse_line(line),
            Err(EnvelopeError::NegativeOffset(-1))
        ));
    }

    #[tokio::test]
    async fn test_fetch_streams_file_and_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"topic":"page-events","offset":0,"payload":{{}}}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"topic":"page-events","offset":1,"payload":{{}}}}"#).unwrap();

        let fetcher = JsonLinesFetcher::new(InputSource::File(file.path().to_path_buf()));
        let mut rx = fetcher.fetch().await.unwrap();

        let mut offsets = Vec::new();
        while let Some(message) = rx.recv().await {
            offsets.push(message.offset);
        }

        assert_eq!(offsets, vec![0, 1]);
        fetcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_skips_non_utf8_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"topic":"page-events","offset":0,"payload":{{}}}}"#).unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        write!(file, "{}\r\n", r#"{"topic":"page-events","offset":2,"payload":{}}"#).unwrap();

        let fetcher = JsonLinesFetcher::new(InputSource::File(file.path().to_path_buf()));
        let mut rx = fetcher.fetch().await.unwrap();

        let mut offsets = Vec::new();
        while let Some(message) = rx.recv().await {
            offsets.push(message.offset);
        }

        assert_eq!(offsets, vec![0, 2]);
        fetcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_error() {
        let fetcher = JsonLinesFetcher::new(InputSource::File("/nonexistent/in.jsonl".into()));
        assert!(fetcher.fetch().await.is_err());
    }
}
