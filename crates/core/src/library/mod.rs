//! Media library hardlink materialization.

mod error;
mod materializer;
mod path;

pub use error::MaterializeError;
pub use materializer::Library;
pub use path::{build_dest_path, normalize, subtitle_suffix};
