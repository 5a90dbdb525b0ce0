pub mod utils;
pub mod types;
pub mod error;
pub mod config;
pub mod rate_source;
pub mod basket;
pub mod index;
pub mod history;
pub mod observability;
pub mod api;
