//! Pipedrive deal flow synchronization: rate limiting, stage-record
//! derivation, the sync engine and its run-status reporting.

pub mod engine;
pub mod progress;
pub mod rate_limit;
pub mod status;
pub mod transform;

pub use engine::{DealFlowSyncer, SyncMode, SyncOptions, SyncReport};
pub use rate_limit::RateLimiter;
pub use status::{DbStatusSink, NoopStatusSink, StatusSink};
