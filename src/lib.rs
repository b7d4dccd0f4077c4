pub mod config;
pub mod error;
pub mod metrics;
pub mod osc;
pub mod pipeline;
pub mod sensor;
pub mod skeleton;
