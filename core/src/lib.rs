pub mod classifier;
pub mod device;
pub mod error;
pub mod liveness;
pub mod recon;
pub mod report;
pub mod scanner;
