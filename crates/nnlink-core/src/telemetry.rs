//! Diagnostics and tracing setup
//!
//! Verbose events (settings, generated queries, relationship requests) are
//! only emitted when the host switched diagnostics on. Warnings are always
//! emitted.

use tracing_subscriber::EnvFilter;

/// Per-activation diagnostics switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    enabled: bool,
}

impl Diagnostics {
    /// Create switch
    #[inline]
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether verbose events are emitted
    #[inline]
    #[must_use]
    pub fn enabled(self) -> bool {
        self.enabled
    }

    /// Emit a verbose event with a debug-formatted payload
    pub fn log(self, message: &str, data: &dyn std::fmt::Debug) {
        if self.enabled {
            tracing::info!(target: "nnlink::diagnostics", data = ?data, "{message}");
        }
    }
}

/// Install a global fmt subscriber
///
/// `RUST_LOG` wins over `default_directive`. Returns `false` when a
/// subscriber was already installed.
pub fn init_tracing(default_directive: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
