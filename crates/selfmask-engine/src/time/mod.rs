//! Time subsystem.
//!
//! Provides frame-rate bookkeeping without coupling to the pipeline.
//! Intended usage:
//! - one `RateMeter` per pipeline
//! - call `tick()` once per processed frame; it returns a report when one is due

mod rate_meter;

pub use rate_meter::{RateMeter, RateReport};
