//! Acquisition pipeline that drives sources to hardlinked media.
//!
//! The pipeline polls feeds, registers torrents, hands them to the
//! download client, tracks progress and classifies the files of
//! completed downloads. One cooperative loop, five phases per cycle.

mod error;
mod runner;

pub use error::PipelineError;
pub use runner::{Pipeline, PipelineDeps, PipelineStatus};
