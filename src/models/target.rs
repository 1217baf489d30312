use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

use crate::builder::check_payload_size;
use crate::error::{ProbeError, Result};
use crate::models::protocols::L3;

/// Default TTL (or IPv6 hop limit) of echo requests.
pub const DEFAULT_TTL: u8 = 64;
/// Default ICMP sequence number.
pub const DEFAULT_SEQUENCE: u16 = 1;
/// Default number of hops probed by MTR.
pub const DEFAULT_MAX_HOPS: u8 = 30;

/// A probe target, with parameters specific to each kind of probe.
///
/// Zero values stand for the defaults; use the accessor methods to get the
/// effective values.
#[derive(Clone, Debug, Serialize)]
pub struct Target<E> {
    /// The address to probe. ICMP and MTR require an IP literal,
    /// TCP also accepts `ip:port`.
    pub address: String,
    /// Maximum time to wait for each reply.
    pub timeout: Duration,
    /// Delay between repeated probes to the same target.
    pub interval: Duration,
    /// Number of probes to send (0 is treated as 1).
    pub count: u32,
    /// Parameters specific to the probe kind.
    pub extension: E,
}

impl<E> Target<E> {
    pub fn new(address: impl Into<String>, extension: E) -> Self {
        Target {
            address: address.into(),
            timeout: Duration::from_secs(1),
            interval: Duration::ZERO,
            count: 1,
            extension,
        }
    }

    pub fn count(&self) -> u32 {
        self.count.max(1)
    }

    /// Parse the target address as an IP literal.
    pub fn ip_addr(&self) -> Result<IpAddr> {
        self.address
            .parse()
            .map_err(|_| ProbeError::InvalidTarget(format!("invalid IP address: {}", self.address)))
    }
}

impl<E: Default> Default for Target<E> {
    fn default() -> Self {
        Target::new("", E::default())
    }
}

impl<E: Display> Display for Target<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "address={}", self.address)?;
        write!(f, " timeout={:?}", self.timeout)?;
        write!(f, " interval={:?}", self.interval)?;
        write!(f, " count={}", self.count())?;
        write!(f, " {}", self.extension)
    }
}

/// ICMP echo parameters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IcmpExtension {
    /// TTL (IPv4) or hop limit (IPv6) of the request, 0 for the default.
    pub ttl: u8,
    /// Address to bind to, or the wildcard address if unset.
    pub source_ip: Option<IpAddr>,
    /// Allow probing IPv6 targets.
    pub enable_v6: bool,
    /// ICMP sequence number, 0 for the default.
    pub sequence: u16,
    /// Size of the echo payload in bytes.
    pub size: usize,
}

impl IcmpExtension {
    pub fn ttl(&self) -> u8 {
        if self.ttl == 0 {
            DEFAULT_TTL
        } else {
            self.ttl
        }
    }

    pub fn sequence(&self) -> u16 {
        if self.sequence == 0 {
            DEFAULT_SEQUENCE
        } else {
            self.sequence
        }
    }

    /// The address family used to reach `addr`.
    /// IPv6 targets are only allowed if `enable_v6` is set.
    pub fn family(&self, addr: IpAddr) -> Result<L3> {
        match L3::of(addr) {
            L3::IPv6 if !self.enable_v6 => Err(ProbeError::InvalidTarget(format!(
                "{} is an IPv6 address but IPv6 is not enabled",
                addr
            ))),
            l3 => Ok(l3),
        }
    }

    /// Check that the payload size fits in a packet of the given family.
    pub fn check_size(&self, l3: L3) -> Result<()> {
        check_payload_size(l3, self.size)
    }

    /// The address to bind to.
    pub fn source(&self, l3: L3) -> Result<IpAddr> {
        match self.source_ip {
            None => Ok(l3.unspecified()),
            Some(ip) if L3::of(ip) == l3 => Ok(ip),
            Some(ip) => Err(ProbeError::InvalidTarget(format!(
                "source address {} does not match the target address family",
                ip
            ))),
        }
    }
}

impl Display for IcmpExtension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ttl={}", self.ttl())?;
        write!(f, " source_ip={:?}", self.source_ip)?;
        write!(f, " enable_v6={}", self.enable_v6)?;
        write!(f, " sequence={}", self.sequence())?;
        write!(f, " size={}", self.size)
    }
}

/// MTR parameters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MtrExtension {
    /// Parameters of each echo request. The TTL is overridden by the sweep.
    pub icmp: IcmpExtension,
    /// Highest TTL probed, 0 for the default.
    pub max_hops: u8,
    /// Resolve the hostname of each hop.
    pub resolve_ptr: bool,
}

impl MtrExtension {
    pub fn max_hops(&self) -> u8 {
        if self.max_hops == 0 {
            DEFAULT_MAX_HOPS
        } else {
            self.max_hops
        }
    }
}

impl Display for MtrExtension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.icmp)?;
        write!(f, " max_hops={}", self.max_hops())?;
        write!(f, " resolve_ptr={}", self.resolve_ptr)
    }
}

/// TCP connect parameters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TcpExtension {
    /// Port to connect to when the address does not specify one.
    pub port: u16,
}

impl Display for TcpExtension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "port={}", self.port)
    }
}
