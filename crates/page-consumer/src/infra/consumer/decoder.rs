use event_dispatch::TopicDecoder;

use crate::domain::models::ConsumerEvent;

pub fn page_decoder(page_topic: &str) -> TopicDecoder<ConsumerEvent> {
    TopicDecoder::new().json(page_topic, ConsumerEvent::Page)
}

#[cfg(test)]
mod tests {
    use event_dispatch::{DecodeError, Event, EventDecoder, Message};

    use super::*;

    #[test]
    fn test_decodes_page_event() {
        let msg = Message::new(
            "page-events",
            0,
            0,
            br#"{"name":"P3","user":"U1","date":1700000000000,"duration":120}"#.to_vec(),
        );
        let event = page_decoder("page-events").decode(&msg).unwrap();

        assert_eq!(event.event_type(), "page_event");
        let ConsumerEvent::Page(page) = event;
        assert_eq!(page.name, "P3");
        assert_eq!(page.duration, 120);
    }

    #[test]
    fn test_other_topics_are_unknown() {
        let msg = Message::new("orders", 0, 0, b"{}".to_vec());
        assert_eq!(
            page_decoder("page-events").decode(&msg).unwrap_err(),
            DecodeError::UnknownTopic("orders".into())
        );
    }

    #[test]
    fn test_configured_topic_name() {
        let msg = Message::new(
            "web-pages",
            0,
            0,
            br#"{"name":"P","user":"U","date":0,"duration":1}"#.to_vec(),
        );
        assert!(page_decoder("web-pages").decode(&msg).is_ok());
        assert!(page_decoder("page-events").decode(&msg).is_err());
    }
}
