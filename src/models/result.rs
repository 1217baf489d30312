use std::fmt::Display;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use strum::{Display, EnumString};

use crate::error::{ProbeError, Result};
use crate::models::target::Target;

/// The kinds of probes implemented by this crate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ProbeKind {
    Icmp,
    Mtr,
    Tcp,
}

/// A probe implementation.
pub trait Prober {
    type Extension;
    type Output: ProbeResult<Extension = Self::Extension>;

    fn kind(&self) -> ProbeKind;

    /// Probe the target.
    ///
    /// `Err` is reserved for failures that prevent the probe from running at
    /// all; an unanswered probe is reported as an unsuccessful result.
    fn probe(&self, target: &Target<Self::Extension>) -> Result<Self::Output>;
}

/// Capabilities shared by the results of every probe kind.
/// The `Display` implementation renders a human-readable report.
pub trait ProbeResult: Display {
    type Extension;

    /// The round-trip time of the probe.
    fn rtt(&self) -> Duration;
    /// The target that was probed.
    fn target(&self) -> &Target<Self::Extension>;
    fn is_success(&self) -> bool;
    /// The error met while probing, if any.
    ///
    /// Errors that prevent the probe from starting (an invalid target) are
    /// returned by [`Prober::probe`] instead. ICMP probes keep the error that
    /// stopped them, MTR the first error of a skipped hop, and TCP the
    /// connection error.
    fn error(&self) -> Option<&ProbeError>;
}

/// Fields common to all results.
#[derive(Debug, Serialize)]
pub struct BaseResult<E> {
    pub target: Target<E>,
    pub success: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ProbeError>,
    pub duration: Duration,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl<E> BaseResult<E> {
    /// Start measuring a new probe.
    pub fn start(target: Target<E>) -> (Self, Instant) {
        let now = Utc::now();
        let result = BaseResult {
            target,
            success: false,
            error: None,
            duration: Duration::ZERO,
            start_time: now,
            end_time: now,
        };
        (result, Instant::now())
    }

    /// Record the end of the probe and the time elapsed since `started`.
    pub fn end(&mut self, started: Instant) {
        self.end_time = Utc::now();
        self.duration = started.elapsed();
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<ProbeError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::models::ProbeKind;

    #[test]
    fn test_probe_kind_strings() {
        assert_eq!(ProbeKind::Icmp.to_string(), "ICMP");
        assert_eq!(ProbeKind::Mtr.to_string(), "MTR");
        assert_eq!(ProbeKind::from_str("TCP").unwrap(), ProbeKind::Tcp);
        assert!(ProbeKind::from_str("HTTP").is_err());
    }
}
