//! Reverse DNS lookups.
use std::net::IpAddr;

use dns_lookup::lookup_addr;
use log::trace;

/// Resolves the hostname of an address.
pub trait PtrResolver {
    /// Return the first name of `addr`, or `None` on any failure.
    fn lookup(&self, addr: IpAddr) -> Option<String>;
}

/// Resolver using the system configuration (`getnameinfo`).
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemResolver;

impl PtrResolver for SystemResolver {
    fn lookup(&self, addr: IpAddr) -> Option<String> {
        match lookup_addr(&addr) {
            Ok(name) => {
                let name = name.trim_end_matches('.');
                // getnameinfo falls back to the numeric form when there is no PTR record.
                if name.is_empty() || name == addr.to_string() {
                    None
                } else {
                    Some(name.to_string())
                }
            }
            Err(error) => {
                trace!("reverse lookup of {} failed: {}", addr, error);
                None
            }
        }
    }
}

impl<F: Fn(IpAddr) -> Option<String>> PtrResolver for F {
    fn lookup(&self, addr: IpAddr) -> Option<String> {
        self(addr)
    }
}
