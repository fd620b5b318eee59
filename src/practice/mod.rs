mod cursor;
mod matcher;

pub use cursor::{CursorState, StreamCursor};
pub use matcher::StreamMatcher;

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Accuracy {
    /// The source has no notes.
    NotApplicable,
    Score { matched: usize, total: usize },
}

impl Accuracy {
    pub fn new(matched: usize, total: usize) -> Self {
        if total == 0 {
            Accuracy::NotApplicable
        } else {
            Accuracy::Score { matched, total }
        }
    }

    /// Rounded to the nearest integer percent.
    pub fn percent(&self) -> Option<u32> {
        match *self {
            Accuracy::NotApplicable => None,
            Accuracy::Score { matched, total } => {
                Some((matched as f64 / total as f64 * 100.0).round() as u32)
            }
        }
    }

    pub fn fraction(&self) -> Option<f64> {
        match *self {
            Accuracy::NotApplicable => None,
            Accuracy::Score { matched, total } => Some(matched as f64 / total as f64),
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Accuracy::NotApplicable => write!(f, "N/A"),
            Accuracy::Score { matched, total } => {
                write!(f, "{}% ({}/{})", self.percent().unwrap_or(0), matched, total)
            }
        }
    }
}
