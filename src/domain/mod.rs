//! Domain types shared across the crate.
//!
//! - Title IDs and their role classification
//! - Progress snapshots for long-running operations

pub mod progress;
pub mod title;

pub use progress::ProgressSnapshot;
pub use title::{classify, family_prefix_of, TitleId, TitleIdError, TitleKind};
