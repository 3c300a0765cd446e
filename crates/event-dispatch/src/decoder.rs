use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::{error::DecodeError, message::Message, registry::Event};

/// Turns a raw message into a typed event. Must be pure: no I/O, no state.
pub trait EventDecoder: Send + Sync + 'static {
    type Event: Event;

    fn decode(&self, message: &Message) -> Result<Self::Event, DecodeError>;
}

type DecodeFn<E> = Box<dyn Fn(&[u8]) -> Result<E, String> + Send + Sync>;

/// Decoder keyed by topic name. Each topic has exactly one payload schema.
pub struct TopicDecoder<E> {
    topics: HashMap<String, DecodeFn<E>>,
}

impl<E: Event> TopicDecoder<E> {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    pub fn topic<F>(mut self, topic: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&[u8]) -> Result<E, String> + Send + Sync + 'static,
    {
        self.topics.insert(topic.into(), Box::new(decode));
        self
    }

    /// Registers a topic whose payload is JSON for `T`, lifted into the event type by `wrap`.
    pub fn json<T, F>(self, topic: impl Into<String>, wrap: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> E + Send + Sync + 'static,
    {
        self.topic(topic, move |bytes| {
            serde_json::from_slice::<T>(bytes)
                .map(&wrap)
                .map_err(|e| e.to_string())
        })
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}

impl<E: Event> Default for TopicDecoder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventDecoder for TopicDecoder<E> {
    type Event = E;

    fn decode(&self, message: &Message) -> Result<E, DecodeError> {
        let decode = self
            .topics
            .get(&message.topic)
            .ok_or_else(|| DecodeError::UnknownTopic(message.topic.clone()))?;

        decode(&message.payload).map_err(|reason| DecodeError::Malformed {
            topic: message.topic.clone(),
            reason,
        })
    }
}
