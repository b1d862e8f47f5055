pub mod app;
pub mod attach;
pub mod compare;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod output;
pub mod preflight;
pub mod providers;
pub mod sdmx;
pub mod store;
