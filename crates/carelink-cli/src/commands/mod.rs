pub mod config;
pub mod request;
