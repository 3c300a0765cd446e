pub mod page_event_handler;
