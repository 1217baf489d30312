//! Per-hop statistics.
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

/// Statistics of the probes answered by one address.
#[derive(Clone, Debug, PartialEq)]
pub struct HopStat {
    /// The TTL at which the address was first seen.
    pub ttl: u8,
    pub address: IpAddr,
    pub sent: u32,
    pub received: u32,
    pub last_rtt: Duration,
    pub best_rtt: Duration,
    pub worst_rtt: Duration,
    sum_rtt: Duration,
    rtts: Vec<Duration>,
}

impl HopStat {
    pub fn new(ttl: u8, address: IpAddr) -> Self {
        HopStat {
            ttl,
            address,
            sent: 0,
            received: 0,
            last_rtt: Duration::ZERO,
            best_rtt: Duration::ZERO,
            worst_rtt: Duration::ZERO,
            sum_rtt: Duration::ZERO,
            rtts: Vec::new(),
        }
    }

    /// Record a probe, answered after `rtt` or lost (`None`).
    /// A zero RTT is treated as a lost probe.
    pub fn update(&mut self, rtt: Option<Duration>) {
        self.sent += 1;
        let rtt = match rtt {
            Some(rtt) if !rtt.is_zero() => rtt,
            _ => return,
        };
        self.received += 1;
        self.last_rtt = rtt;
        self.sum_rtt += rtt;
        self.rtts.push(rtt);
        if self.received == 1 || rtt < self.best_rtt {
            self.best_rtt = rtt;
        }
        if rtt > self.worst_rtt {
            self.worst_rtt = rtt;
        }
    }

    pub fn avg_rtt(&self) -> Duration {
        if self.received == 0 {
            return Duration::ZERO;
        }
        self.sum_rtt / self.received
    }

    /// The fraction of lost probes, between 0 and 1.
    pub fn loss_rate(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        (self.sent - self.received) as f64 / self.sent as f64
    }

    /// The sample standard deviation of the RTTs.
    pub fn stddev_rtt(&self) -> Duration {
        if self.rtts.len() < 2 {
            return Duration::ZERO;
        }
        let avg = self.avg_rtt().as_secs_f64();
        let sum: f64 = self
            .rtts
            .iter()
            .map(|rtt| (rtt.as_secs_f64() - avg).powi(2))
            .sum();
        Duration::from_secs_f64((sum / (self.rtts.len() - 1) as f64).sqrt())
    }

    /// The RTT samples, in the order they were recorded.
    pub fn samples(&self) -> &[Duration] {
        &self.rtts
    }
}

/// The statistics of all the addresses seen during one sweep.
#[derive(Debug, Default)]
pub struct HopTable {
    stats: HashMap<IpAddr, HopStat>,
}

impl HopTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the statistics of `address`, created with `ttl` if the address is new.
    pub fn get_or_create(&mut self, address: IpAddr, ttl: u8) -> &mut HopStat {
        self.stats
            .entry(address)
            .or_insert_with(|| HopStat::new(ttl, address))
    }

    pub fn get(&self, address: &IpAddr) -> Option<&HopStat> {
        self.stats.get(address)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// The statistics ordered by TTL.
    pub fn into_sorted(self) -> Vec<HopStat> {
        let mut stats: Vec<HopStat> = self.stats.into_values().collect();
        stats.sort_by_key(|stat| (stat.ttl, stat.address));
        stats
    }
}
