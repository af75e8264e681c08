//! # framecast diagnostics
//!
//! Logging setup and health reporting for the framecast pipeline.
//! Provides subscriber initialization, a periodic metrics reporter and
//! serializable pipeline reports.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod logging;
pub mod report;
pub mod reporter;

// Re-export main types
pub use logging::init_logging;
pub use report::{PipelineHealth, PipelineReport};
pub use reporter::MetricsReporter;
