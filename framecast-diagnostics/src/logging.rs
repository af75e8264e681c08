//! Structured logging setup

use framecast_core::{FramecastError, FramecastResult};
use tracing_subscriber::filter::{Directive, EnvFilter};

/// Install the global fmt subscriber.
///
/// `default_level` applies when `RUST_LOG` is unset or unparsable; a
/// `RUST_LOG` value always wins. Fails if a global subscriber is already set.
pub fn init_logging(default_level: &str) -> FramecastResult<()> {
    let directive: Directive = default_level
        .parse()
        .map_err(|e| FramecastError::invalid_config("log_level", format!("{e}")))?;

    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| FramecastError::Initialization {
            reason: format!("logging: {e}"),
        })
}
