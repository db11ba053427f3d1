pub mod config;
pub mod core;
pub mod interfaces;
pub mod jobs;
pub mod logging;
pub mod store;
pub mod tools;
