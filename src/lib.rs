pub mod booster;
pub mod classification;
pub mod column_log;
pub mod config;
pub mod constants;
pub mod crowd;
pub mod engine;
pub mod error;
pub mod handshake;
pub mod runner;
pub mod strength;
pub mod types;
