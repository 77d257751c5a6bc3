pub mod api;
pub mod clients;
pub mod config;
pub mod fanout;
pub mod models;
pub mod reporting;
pub mod utils;
