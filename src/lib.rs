pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod telemetry;
