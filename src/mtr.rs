//! MTR: traceroute and ping combined.
//!
//! Echo requests are sent with an increasing TTL, starting from 1. Each
//! answering address (router or target) gets its own statistics. Once the
//! target answers, `count - 1` additional requests are sent at the same TTL
//! to measure its latency and loss, and the sweep stops.
//!
//! Errors on individual hops (e.g. a failure to open a socket) are logged and
//! skipped, so that a lossy or filtering path does not stop the discovery. The
//! first of them is kept in the result. Only an invalid target fails the
//! whole probe.
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::engine::{EchoOutcome, EchoRequest, EchoSender, IcmpEngine};
use crate::error::{ProbeError, Result};
use crate::identifier::EchoIdAllocator;
use crate::lookup::{PtrResolver, SystemResolver};
use crate::models::{BaseResult, MtrExtension, ProbeKind, ProbeResult, Prober, Target};
use crate::stats::{HopStat, HopTable};

/// A hop of the path, as reported to the caller.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MtrHop {
    /// The TTL at which the address was first seen.
    pub ttl: u8,
    pub address: IpAddr,
    pub hostname: Option<String>,
    /// Percentage of lost probes, between 0 and 100.
    pub loss: f64,
    pub sent: u32,
    pub received: u32,
    pub last_rtt: Duration,
    pub avg_rtt: Duration,
    pub best_rtt: Duration,
    pub worst_rtt: Duration,
    pub stddev_rtt: Duration,
}

impl MtrHop {
    pub fn from_stat(stat: &HopStat, hostname: Option<String>) -> Self {
        MtrHop {
            ttl: stat.ttl,
            address: stat.address,
            hostname,
            loss: stat.loss_rate() * 100.0,
            sent: stat.sent,
            received: stat.received,
            last_rtt: stat.last_rtt,
            avg_rtt: stat.avg_rtt(),
            best_rtt: stat.best_rtt,
            worst_rtt: stat.worst_rtt,
            stddev_rtt: stat.stddev_rtt(),
        }
    }

    /// `hostname (address)` if the hostname is known, `address` otherwise.
    pub fn display_name(&self) -> String {
        match &self.hostname {
            Some(hostname) => format!("{} ({})", hostname, self.address),
            None => self.address.to_string(),
        }
    }
}

/// The result of an MTR probe.
///
/// The base duration is the time taken by the whole sweep.
#[derive(Debug, Serialize)]
pub struct MtrResult {
    #[serde(flatten)]
    pub base: BaseResult<MtrExtension>,
    /// The hops that answered, ordered by TTL.
    pub hops: Vec<MtrHop>,
    /// Whether the target itself answered.
    pub reached: bool,
}

impl MtrResult {
    /// The hop of the target, if it answered.
    pub fn target_hop(&self) -> Option<&MtrHop> {
        let addr = self.base.target.ip_addr().ok()?;
        self.hops.iter().find(|hop| hop.address == addr)
    }
}

impl ProbeResult for MtrResult {
    type Extension = MtrExtension;

    /// The average RTT to the target, or zero if it was not reached.
    fn rtt(&self) -> Duration {
        self.target_hop()
            .map(|hop| hop.avg_rtt)
            .unwrap_or(Duration::ZERO)
    }

    fn target(&self) -> &Target<MtrExtension> {
        &self.base.target
    }

    fn is_success(&self) -> bool {
        self.base.success
    }

    fn error(&self) -> Option<&ProbeError> {
        self.base.error.as_ref()
    }
}

/// Round a duration to the millisecond.
fn format_ms(duration: Duration) -> String {
    format!("{}ms", (duration.as_micros() + 500) / 1000)
}

impl Display for MtrResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if !self.base.success {
            return match &self.base.error {
                Some(error) => write!(f, "MTR probe failed: {}", error),
                None => write!(f, "MTR probe failed"),
            };
        }
        writeln!(f, "MTR to {}", self.base.target.address)?;
        writeln!(
            f,
            "HOP  ADDRESS                  LOSS%  SENT  RECV  LAST   AVG    BEST   WORST  STDEV"
        )?;
        for hop in &self.hops {
            writeln!(
                f,
                "{:<4} {:<24} {:>5.1}% {:>4}  {:>4}  {:>6} {:>6} {:>6} {:>6} {:>6}",
                hop.ttl,
                hop.display_name(),
                hop.loss,
                hop.sent,
                hop.received,
                format_ms(hop.last_rtt),
                format_ms(hop.avg_rtt),
                format_ms(hop.best_rtt),
                format_ms(hop.worst_rtt),
                format_ms(hop.stddev_rtt),
            )?;
        }
        Ok(())
    }
}

/// Discovers the path to a target and measures every hop.
pub struct MtrProber<S, R = SystemResolver> {
    sender: S,
    resolver: R,
    ids: Arc<EchoIdAllocator>,
}

impl MtrProber<IcmpEngine> {
    /// Build a prober on raw sockets, with its own identifier allocator.
    pub fn new() -> Result<Self> {
        Ok(Self::with_sender(
            IcmpEngine::new()?,
            SystemResolver,
            Arc::new(EchoIdAllocator::random()),
        ))
    }
}

impl<S: EchoSender, R: PtrResolver> MtrProber<S, R> {
    /// Build a prober sharing an identifier allocator with other probers.
    pub fn with_sender(sender: S, resolver: R, ids: Arc<EchoIdAllocator>) -> Self {
        MtrProber {
            sender,
            resolver,
            ids,
        }
    }

    fn probe_hop(&self, base: &EchoRequest, ttl: u8) -> Result<EchoOutcome> {
        let request = EchoRequest {
            ttl,
            identifier: self.ids.get(),
            ..base.clone()
        };
        self.sender.send_echo(&request)
    }
}

impl<S: EchoSender, R: PtrResolver> Prober for MtrProber<S, R> {
    type Extension = MtrExtension;
    type Output = MtrResult;

    fn kind(&self) -> ProbeKind {
        ProbeKind::Mtr
    }

    fn probe(&self, target: &Target<MtrExtension>) -> Result<MtrResult> {
        let dst_addr = target.ip_addr()?;
        let icmp = &target.extension.icmp;
        let l3 = icmp.family(dst_addr)?;
        icmp.check_size(l3)?;
        let base_request = EchoRequest {
            dst_addr,
            src_addr: icmp.source(l3)?,
            ttl: icmp.ttl(),
            identifier: 0,
            sequence: icmp.sequence(),
            size: icmp.size,
            timeout: target.timeout,
        };
        info!("{} {}", self.kind(), target);

        let (base, started) = BaseResult::start(target.clone());
        let mut table = HopTable::new();
        let mut reached = false;
        let mut first_error = None;

        for ttl in 1..=target.extension.max_hops() {
            let outcome = match self.probe_hop(&base_request, ttl) {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!("ttl={} error={}", ttl, error);
                    first_error.get_or_insert(error);
                    continue;
                }
            };
            let from = match outcome {
                EchoOutcome::Answered { from, rtt, .. } => {
                    debug!("ttl={} from={} rtt={:?}", ttl, from, rtt);
                    table.get_or_create(from, ttl).update(Some(rtt));
                    from
                }
                EchoOutcome::Timeout { .. } => {
                    debug!("ttl={} no response", ttl);
                    continue;
                }
            };
            if from != dst_addr {
                continue;
            }

            reached = true;
            for _ in 1..target.count() {
                if !target.interval.is_zero() {
                    sleep(target.interval);
                }
                // Only the target is recorded at its TTL, so hops keep distinct TTLs.
                match self.probe_hop(&base_request, ttl) {
                    Ok(EchoOutcome::Answered { from, rtt, .. }) if from == dst_addr => {
                        table.get_or_create(dst_addr, ttl).update(Some(rtt))
                    }
                    Ok(outcome) => {
                        debug!(
                            "ttl={} lost probe to target responder={:?}",
                            ttl,
                            outcome.responder()
                        );
                        table.get_or_create(dst_addr, ttl).update(None)
                    }
                    Err(error) => {
                        warn!("ttl={} error={}", ttl, error);
                        first_error.get_or_insert(error);
                    }
                }
            }
            break;
        }

        let hops: Vec<MtrHop> = table
            .into_sorted()
            .iter()
            .map(|stat| {
                let hostname = if target.extension.resolve_ptr {
                    self.resolver.lookup(stat.address)
                } else {
                    None
                };
                MtrHop::from_stat(stat, hostname)
            })
            .collect();

        let mut result = MtrResult {
            base,
            hops,
            reached,
        };
        result.base.end(started);
        result.base.success = !result.hops.is_empty();
        result.base.error = first_error;
        info!(
            "{} hops={} reached={} duration={:?}",
            self.kind(),
            result.hops.len(),
            result.reached,
            result.base.duration
        );
        Ok(result)
    }
}
