pub mod consumer;
pub mod decoder;
pub mod handlers;
pub mod middleware;

pub use consumer::Consumer;
pub use decoder::page_decoder;
pub use handlers::page_event_handler::PageEventHandler;
pub use middleware::logger_middleware::LoggingMiddleware;
