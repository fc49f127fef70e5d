//! Logging setup for Liaison binaries.
//!
//! Every binary calls [`init`] once at startup. `RUST_LOG` wins when set;
//! otherwise the binary's default directive applies.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when neither `RUST_LOG` nor a binary default is given.
pub const DEFAULT_DIRECTIVE: &str = "liaison=info";

/// Build the filter: `RUST_LOG` if it parses, else `default_directive`.
pub fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_directive: &str) {
    let installed = tracing_subscriber::registry()
        .with(filter(default_directive))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_ok() {
        tracing::debug!(default_directive, "Logging initialised");
    }
}
