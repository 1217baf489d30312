//! ICMP echo ("ping") probes.
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::engine::{EchoOutcome, EchoRequest, EchoSender, IcmpEngine, Response};
use crate::error::{ProbeError, Result};
use crate::identifier::EchoIdAllocator;
use crate::models::{BaseResult, IcmpExtension, ProbeKind, ProbeResult, Prober, Target};

/// The result of an ICMP probe.
#[derive(Debug, Serialize)]
pub struct IcmpResult {
    #[serde(flatten)]
    pub base: BaseResult<IcmpExtension>,
    /// The address that answered the first matched request.
    pub address: Option<IpAddr>,
    /// The kind of message that answered the first matched request.
    #[serde(skip)]
    pub response: Option<Response>,
    /// The sequence number of the first request.
    pub sequence: u16,
    pub size: usize,
    pub sent: u32,
    pub received: u32,
}

impl ProbeResult for IcmpResult {
    type Extension = IcmpExtension;

    fn rtt(&self) -> Duration {
        self.base.duration
    }

    fn target(&self) -> &Target<IcmpExtension> {
        &self.base.target
    }

    fn is_success(&self) -> bool {
        self.base.success
    }

    fn error(&self) -> Option<&ProbeError> {
        self.base.error.as_ref()
    }
}

impl Display for IcmpResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.address {
            Some(address) if self.base.success => {
                write!(f, "RTT: {:?}, Address: {}", self.base.duration, address)
            }
            _ => match &self.base.error {
                Some(error) => write!(f, "ICMP probe failed: {}", error),
                None => write!(f, "ICMP probe failed"),
            },
        }
    }
}

/// Sends `count` echo requests to the target.
///
/// The probe succeeds if at least one request is answered, either by the
/// target or, when the TTL is too small, by a router on the path. A send or
/// receive error stops the remaining requests and is kept in the result,
/// along with the counters of the requests already made.
pub struct IcmpProber<S> {
    sender: S,
    ids: Arc<EchoIdAllocator>,
}

impl IcmpProber<IcmpEngine> {
    /// Build a prober on raw sockets, with its own identifier allocator.
    pub fn new() -> Result<Self> {
        Ok(Self::with_sender(
            IcmpEngine::new()?,
            Arc::new(EchoIdAllocator::random()),
        ))
    }
}

impl<S: EchoSender> IcmpProber<S> {
    /// Build a prober sharing an identifier allocator with other probers.
    pub fn with_sender(sender: S, ids: Arc<EchoIdAllocator>) -> Self {
        IcmpProber { sender, ids }
    }
}

impl<S: EchoSender> Prober for IcmpProber<S> {
    type Extension = IcmpExtension;
    type Output = IcmpResult;

    fn kind(&self) -> ProbeKind {
        ProbeKind::Icmp
    }

    fn probe(&self, target: &Target<IcmpExtension>) -> Result<IcmpResult> {
        let dst_addr = target.ip_addr()?;
        let extension = &target.extension;
        let l3 = extension.family(dst_addr)?;
        extension.check_size(l3)?;
        let src_addr = extension.source(l3)?;
        info!("{} {}", self.kind(), target);

        let (base, started) = BaseResult::start(target.clone());
        let mut result = IcmpResult {
            base,
            address: None,
            response: None,
            sequence: extension.sequence(),
            size: extension.size,
            sent: 0,
            received: 0,
        };

        let mut first_rtt = None;
        for i in 0..target.count() {
            if i > 0 && !target.interval.is_zero() {
                sleep(target.interval);
            }
            let request = EchoRequest {
                dst_addr,
                src_addr,
                ttl: extension.ttl(),
                identifier: self.ids.get(),
                sequence: extension.sequence().wrapping_add(i as u16),
                size: extension.size,
                timeout: target.timeout,
            };
            let outcome = match self.sender.send_echo(&request) {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!("seq={} error={}", request.sequence, error);
                    result.base.error = Some(error);
                    break;
                }
            };
            result.sent += 1;
            if let EchoOutcome::Answered {
                response,
                from,
                rtt,
            } = outcome
            {
                result.received += 1;
                if first_rtt.is_none() {
                    first_rtt = Some(rtt);
                    result.address = Some(from);
                    result.response = Some(response);
                }
            }
        }

        result.base.end(started);
        result.base.success = result.received > 0;
        if let Some(rtt) = first_rtt {
            result.base.duration = rtt;
        }
        Ok(result)
    }
}
