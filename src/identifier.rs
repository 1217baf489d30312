//! Allocation of ICMP echo identifiers.
//!
//! Probes running concurrently through the same allocator receive distinct
//! identifiers, as long as fewer than 65535 identifiers are drawn while a
//! probe is in flight. The counter is reduced modulo 65535 before being
//! truncated to 16 bits.
use std::sync::atomic::{AtomicU32, Ordering};

use rand::{thread_rng, Rng};

/// A thread-safe source of echo identifiers.
///
/// The allocator is meant to be shared (e.g. behind an `Arc`) by every prober
/// that may have probes in flight at the same time.
#[derive(Debug, Default)]
pub struct EchoIdAllocator {
    counter: AtomicU32,
}

impl EchoIdAllocator {
    /// Build an allocator whose first identifier is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an allocator starting at a random position, so that distinct
    /// processes are unlikely to use the same identifiers.
    pub fn random() -> Self {
        Self::starting_at(thread_rng().gen_range(0..u16::MAX as u32))
    }

    /// Build an allocator whose next identifier is `(start + 1) % 65535`.
    pub fn starting_at(start: u32) -> Self {
        EchoIdAllocator {
            counter: AtomicU32::new(start),
        }
    }

    /// Return the next identifier.
    pub fn get(&self) -> u16 {
        let value = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        (value % 65535) as u16
    }
}
