//! TCP connect probes.
use std::fmt::{Display, Formatter};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;

use crate::error::{ProbeError, Result};
use crate::models::{BaseResult, ProbeKind, ProbeResult, Prober, Target, TcpExtension};

/// The result of a TCP connect probe.
///
/// A failed connection is not an error of the probe itself: it is recorded
/// in the result.
#[derive(Debug, Serialize)]
pub struct TcpResult {
    #[serde(flatten)]
    pub base: BaseResult<TcpExtension>,
}

impl ProbeResult for TcpResult {
    type Extension = TcpExtension;

    /// The time taken to establish the connection.
    fn rtt(&self) -> Duration {
        self.base.duration
    }

    fn target(&self) -> &Target<TcpExtension> {
        &self.base.target
    }

    fn is_success(&self) -> bool {
        self.base.success
    }

    fn error(&self) -> Option<&ProbeError> {
        self.base.error.as_ref()
    }
}

impl Display for TcpResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.base.error {
            Some(error) => write!(f, "-> {} error: {}", self.base.target.address, error),
            None => write!(f, "-> {} {:?}", self.base.target.address, self.base.duration),
        }
    }
}

/// Connects to `address` (an `ip:port` pair, or an IP and the extension port).
#[derive(Copy, Clone, Debug, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        TcpProber
    }
}

fn socket_addr(target: &Target<TcpExtension>) -> Result<SocketAddr> {
    if let Ok(addr) = target.address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let ip = target.ip_addr()?;
    match target.extension.port {
        0 => Err(ProbeError::InvalidTarget(format!(
            "no port specified for {}",
            target.address
        ))),
        port => Ok(SocketAddr::new(ip, port)),
    }
}

impl Prober for TcpProber {
    type Extension = TcpExtension;
    type Output = TcpResult;

    fn kind(&self) -> ProbeKind {
        ProbeKind::Tcp
    }

    fn probe(&self, target: &Target<TcpExtension>) -> Result<TcpResult> {
        let addr = socket_addr(target)?;
        info!("{} {}", self.kind(), target);

        let (base, started) = BaseResult::start(target.clone());
        let mut result = TcpResult { base };
        let stream = if target.timeout.is_zero() {
            TcpStream::connect(addr)
        } else {
            TcpStream::connect_timeout(&addr, target.timeout)
        };
        result.base.end(started);

        match stream {
            Ok(_) => {
                debug!("connected to {} in {:?}", addr, result.base.duration);
                result.base.success = true;
            }
            Err(error) => {
                debug!("cannot connect to {}: {}", addr, error);
                result.base.error = Some(ProbeError::Io(error));
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Duration;

    use crate::error::ProbeError;
    use crate::models::{ProbeResult, Prober, Target, TcpExtension};
    use crate::tcp::TcpProber;

    #[test]
    fn test_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut target = Target::new("127.0.0.1", TcpExtension { port: addr.port() });
        target.timeout = Duration::from_secs(1);
        let result = TcpProber::new().probe(&target).unwrap();
        assert!(result.is_success());
        assert!(result.error().is_none());
        assert!(result.to_string().starts_with("-> 127.0.0.1 "));
    }

    #[test]
    fn test_connection_refused() {
        // Bind then drop the listener to get a port that is (very likely) closed.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let target = Target::new(addr.to_string(), TcpExtension::default());
        let result = TcpProber::new().probe(&target).unwrap();
        assert!(!result.is_success());
        assert!(result.error().is_some());
        assert!(result.to_string().contains("error:"));
    }

    #[test]
    fn test_missing_port() {
        let target = Target::new("127.0.0.1", TcpExtension::default());
        assert!(matches!(
            TcpProber::new().probe(&target),
            Err(ProbeError::InvalidTarget(_))
        ));
    }
}
