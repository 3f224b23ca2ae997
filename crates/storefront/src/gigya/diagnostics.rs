//! Gigya diagnostic log.

use std::fmt::Display;

/// Debug-gated log for identity-service diagnostics.
///
/// Emits under the `gigya` target only when `GIGYA_DEBUG_MODE` is on.
/// Logging never fails and never blocks the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticLog {
    enabled: bool,
}

impl DiagnosticLog {
    /// Create a diagnostic log.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether messages are emitted.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log a diagnostic message for `operation`.
    pub fn log(&self, operation: &str, message: impl Display) {
        if self.enabled {
            tracing::info!(target: "gigya", operation, "{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disabled() {
        assert!(!DiagnosticLog::default().is_enabled());
        assert!(DiagnosticLog::new(true).is_enabled());
    }
}
