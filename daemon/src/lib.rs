pub mod collector;
pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod protocol;
pub mod publisher;
pub mod scheduler;
