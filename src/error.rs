//! Error types.
use std::io;

use thiserror::Error;

/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors returned by the probers.
///
/// A probe that simply receives no answer before its deadline is not an error:
/// it is reported through the `success` flag of the result.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The target cannot be probed as given (e.g. not an IP literal).
    /// Raised before any socket I/O.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The address family is not usable by this engine.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Opening or configuring the socket failed (permissions, bind, options...).
    #[error("socket setup failed ({step}): {source}")]
    Setup {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    /// A non-temporary error while sending or receiving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProbeError {
    pub(crate) fn setup(step: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| ProbeError::Setup { step, source }
    }

    /// Whether this error was raised while preparing the probe, before anything was sent.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ProbeError::Setup { .. } | ProbeError::Unsupported(_) | ProbeError::InvalidTarget(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::error::ProbeError;

    #[test]
    fn test_is_setup() {
        let denied = || io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(ProbeError::setup("open raw socket")(denied()).is_setup());
        assert!(ProbeError::InvalidTarget("x".to_string()).is_setup());
        assert!(!ProbeError::Io(denied()).is_setup());
        assert_eq!(
            ProbeError::setup("bind source address")(denied()).to_string(),
            "socket setup failed (bind source address): denied"
        );
    }
}
