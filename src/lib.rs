pub mod address_parser;
pub mod batch_search;
pub mod collaborators;
pub mod config;
pub mod executor;
pub mod notifications;
pub mod report;
pub mod retry;
pub mod session;
pub mod types;
pub mod user_settings;
pub mod utils;
