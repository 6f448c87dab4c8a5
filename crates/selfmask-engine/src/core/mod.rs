//! Core pipeline contracts.
//!
//! `SelfFilter` drives one depth frame through every render stage and hands
//! the results to a `Publisher`. The pose lookup, model set and publisher are
//! collaborators passed in by the caller; the pipeline owns only GPU-side
//! state derived from them.

mod output;
mod pipeline;
mod settings;

pub use output::{DepthImage, MaskImage, Output, Publisher};
pub use pipeline::{FilterResult, FrameOutcome, PipelineState, SelfFilter, SkipReason};
pub use settings::FilterSettings;
