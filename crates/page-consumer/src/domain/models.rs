use std::fmt::{self, Display};

use chrono::{DateTime, TimeZone, Utc};
use event_dispatch::Event;
use serde::{Deserialize, Deserializer, Serialize};

/// A page visit as published by the web tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEvent {
    pub name: String,
    pub user: String,
    #[serde(deserialize_with = "millis_or_rfc3339")]
    pub date: DateTime<Utc>,
    pub duration: i64,
}

impl Display for PageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PageEvent(name={}, user={}, date={}, duration={})",
            self.name,
            self.user,
            self.date.to_rfc3339(),
            self.duration
        )
    }
}

/// Producers on the JVM side send dates as epoch millis, others as RFC 3339.
fn millis_or_rfc3339<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDate {
        Millis(i64),
        Text(DateTime<Utc>),
    }

    match RawDate::deserialize(deserializer)? {
        RawDate::Text(date) => Ok(date),
        RawDate::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Page,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Page => "page_event",
        }
    }
}

impl From<&ConsumerEvent> for Route {
    fn from(event: &ConsumerEvent) -> Self {
        match event {
            ConsumerEvent::Page(_) => Route::Page,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    Page(PageEvent),
}

impl Event for ConsumerEvent {
    fn event_type(&self) -> &str {
        Route::from(self).as_str()
    }
}
