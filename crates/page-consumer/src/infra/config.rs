use std::{
    collections::HashMap,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use event_dispatch::DispatchConfig;
use serde::Deserialize;

const PREFIX: &str = "CONSUMER_";

const DEFAULT_PAGE_TOPIC: &str = "page-events";
const DEFAULT_DEAD_LETTER_PATH: &str = "dead-letter.jsonl";

pub struct Config {
    kv: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let kv = std::env::vars()
            .filter(|(k, _)| k.starts_with(PREFIX))
            .collect();

        Self { kv }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_map(kv: HashMap<String, String>) -> Self {
        Self { kv }
    }

    pub fn optional(&self, key: &str) -> Option<&str> {
        self.kv.get(key).map(|v| v.as_str())
    }

    pub fn parse<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| anyhow::anyhow!("config key '{key}' = '{raw}': {e}"))
            })
            .transpose()
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl From<&str> for InputSource {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "" | "-" => InputSource::Stdin,
            path => InputSource::File(PathBuf::from(path)),
        }
    }
}

/// Optional YAML settings file; anything set in the environment wins.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FileSettings {
    input: Option<String>,
    dead_letter_path: Option<PathBuf>,
    page_topic: Option<String>,
    dispatch: DispatchConfig,
}

impl FileSettings {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub input: InputSource,
    pub dead_letter_path: PathBuf,
    pub page_topic: String,
    pub dispatch: DispatchConfig,
}

impl Settings {
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let file = match config.optional("CONSUMER_CONFIG_FILE") {
            Some(path) => FileSettings::load(Path::new(path))?,
            None => FileSettings::default(),
        };

        let input = config
            .optional("CONSUMER_INPUT")
            .map(String::from)
            .or(file.input)
            .unwrap_or_else(|| "-".to_string());

        let dead_letter_path = config
            .optional("CONSUMER_DEAD_LETTER_PATH")
            .map(PathBuf::from)
            .or(file.dead_letter_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEAD_LETTER_PATH));

        let page_topic = config
            .optional("CONSUMER_PAGE_TOPIC")
            .map(String::from)
            .or(file.page_topic)
            .unwrap_or_else(|| DEFAULT_PAGE_TOPIC.to_string());

        let base = file.dispatch;
        let dispatch = DispatchConfig {
            max_retries: config.parse_or("CONSUMER_MAX_RETRIES", base.max_retries)?,
            base_backoff_ms: config.parse_or("CONSUMER_BASE_BACKOFF_MS", base.base_backoff_ms)?,
            backoff_factor: config.parse_or("CONSUMER_BACKOFF_FACTOR", base.backoff_factor)?,
            backoff_cap_ms: config.parse_or("CONSUMER_BACKOFF_CAP_MS", base.backoff_cap_ms)?,
            handler_timeout_ms: config
                .parse_or("CONSUMER_HANDLER_TIMEOUT_MS", base.handler_timeout_ms)?,
            partition_queue_capacity: config.parse_or(
                "CONSUMER_PARTITION_QUEUE_CAPACITY",
                base.partition_queue_capacity,
            )?,
            commit_past_failures: config
                .parse_or("CONSUMER_COMMIT_PAST_FAILURES", base.commit_past_failures)?,
        };
        dispatch.validate()?;

        Ok(Self {
            input: InputSource::from(input.as_str()),
            dead_letter_path,
            page_topic,
            dispatch,
        })
    }
}
