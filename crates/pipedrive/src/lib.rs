pub mod client;
pub mod models;

pub use client::{PipedriveClient, PipedriveConfig, PipedriveError};
