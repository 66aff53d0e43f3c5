pub mod config;
pub mod credentials;
pub mod error;
pub mod log;
pub mod network;
pub mod probe;
