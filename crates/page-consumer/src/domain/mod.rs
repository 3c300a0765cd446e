pub mod consumer;
pub mod fetcher;
pub mod models;
