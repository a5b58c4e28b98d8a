// Windows Services Observer
// Library root

pub mod app;
pub mod collector;
pub mod config;
pub mod error;
pub mod exporter;
pub mod host;
pub mod logging;
pub mod services;
pub mod version;
