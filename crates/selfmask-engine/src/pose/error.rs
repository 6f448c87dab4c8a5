use std::fmt;

use super::PoseTime;
use crate::sensor::Stamp;

/// Why a transform could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupFailure {
    /// The frame has never been published.
    UnknownFrame(String),

    /// Both frames are known but live in different trees.
    Disconnected { source: String, target: String },

    /// Data for `frame` has not reached the requested time before the deadline.
    NotYetAvailable {
        frame: String,
        requested: PoseTime,
        latest: Stamp,
    },

    /// The frame graph has a cycle through `frame`.
    Cycle(String),

    /// The lookup backend itself failed (service gone, channel closed, ...).
    Backend(String),
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFailure::UnknownFrame(frame) => {
                write!(f, "frame \"{frame}\" does not exist")
            }
            LookupFailure::Disconnected { source, target } => write!(
                f,
                "\"{source}\" and \"{target}\" are not part of the same tree"
            ),
            LookupFailure::NotYetAvailable {
                frame,
                requested,
                latest,
            } => write!(
                f,
                "no transform for \"{frame}\" at {requested} (latest data at {latest})"
            ),
            LookupFailure::Cycle(frame) => write!(f, "frame graph has a cycle through \"{frame}\""),
            LookupFailure::Backend(msg) => write!(f, "pose lookup failed: {msg}"),
        }
    }
}

impl std::error::Error for LookupFailure {}
