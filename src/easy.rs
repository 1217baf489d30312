//! High-level interface for probing a single target.
//!
//! ```no_run
//! use libprobe::easy::{mtr, Config};
//!
//! let config = Config::default();
//! let result = mtr("8.8.8.8", &config).unwrap();
//!
//! println!("{}", result);
//! ```
use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::info;

use crate::engine::IcmpEngine;
use crate::error::Result;
use crate::icmp::{IcmpProber, IcmpResult};
use crate::identifier::EchoIdAllocator;
use crate::lookup::SystemResolver;
use crate::models::{IcmpExtension, MtrExtension, Prober, Target};
use crate::mtr::{MtrProber, MtrResult};

/// Probing configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Time to wait for each reply.
    pub timeout: Duration,
    /// Delay between repeated probes.
    pub interval: Duration,
    /// Number of probes sent to the target.
    pub count: u32,
    /// TTL of ping requests (MTR sweeps the TTL).
    pub ttl: u8,
    /// Address to send from (the OS picks one by default).
    pub source_ip: Option<IpAddr>,
    /// Allow IPv6 targets.
    pub enable_v6: bool,
    /// Size of the echo payload in bytes.
    pub size: usize,
    /// Highest TTL probed by MTR.
    pub max_hops: u8,
    /// Resolve hop hostnames.
    pub resolve_ptr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timeout: Duration::from_secs(1),
            interval: Duration::ZERO,
            count: 1,
            ttl: 64,
            source_ip: None,
            enable_v6: true,
            size: 56,
            max_hops: 30,
            resolve_ptr: false,
        }
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "timeout={:?}", self.timeout)?;
        write!(f, " interval={:?}", self.interval)?;
        write!(f, " count={}", self.count)?;
        write!(f, " ttl={}", self.ttl)?;
        write!(f, " source_ip={:?}", self.source_ip)?;
        write!(f, " enable_v6={}", self.enable_v6)?;
        write!(f, " size={}", self.size)?;
        write!(f, " max_hops={}", self.max_hops)?;
        write!(f, " resolve_ptr={}", self.resolve_ptr)
    }
}

impl Config {
    fn icmp_extension(&self) -> IcmpExtension {
        IcmpExtension {
            ttl: self.ttl,
            source_ip: self.source_ip,
            enable_v6: self.enable_v6,
            sequence: 0,
            size: self.size,
        }
    }

    fn target<E>(&self, address: &str, extension: E) -> Target<E> {
        Target {
            address: address.to_string(),
            timeout: self.timeout,
            interval: self.interval,
            count: self.count,
            extension,
        }
    }

    /// The ICMP target for `address`.
    pub fn icmp_target(&self, address: &str) -> Target<IcmpExtension> {
        self.target(address, self.icmp_extension())
    }

    /// The MTR target for `address`.
    pub fn mtr_target(&self, address: &str) -> Target<MtrExtension> {
        let extension = MtrExtension {
            icmp: self.icmp_extension(),
            max_hops: self.max_hops,
            resolve_ptr: self.resolve_ptr,
        };
        self.target(address, extension)
    }
}

/// Ping `address`.
pub fn ping(address: &str, config: &Config) -> Result<IcmpResult> {
    IcmpProber::new()?.probe(&config.icmp_target(address))
}

/// Run MTR towards `address`.
pub fn mtr(address: &str, config: &Config) -> Result<MtrResult> {
    MtrProber::new()?.probe(&config.mtr_target(address))
}

/// Run MTR towards several targets concurrently, one thread per target.
///
/// The sweeps share a single identifier allocator; results are returned in the
/// order of `addresses`.
pub fn mtr_many(addresses: &[&str], config: &Config) -> Result<Vec<Result<MtrResult>>> {
    info!("{}", config);
    let engine = IcmpEngine::new()?;
    let ids = Arc::new(EchoIdAllocator::random());
    let results: Vec<Result<MtrResult>> = thread::scope(|scope| {
        let handles: Vec<_> = addresses
            .iter()
            .map(|address| {
                let prober = MtrProber::with_sender(&engine, SystemResolver, ids.clone());
                let target = config.mtr_target(address);
                scope.spawn(move || prober.probe(&target))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });
    Ok(results)
}
