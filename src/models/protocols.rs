use std::net::IpAddr;

use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use serde::Serialize;
use socket2::{Domain, Protocol};

/// Layer 3 protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum L3 {
    IPv4,
    IPv6,
}

impl L3 {
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => L3::IPv4,
            IpAddr::V6(_) => L3::IPv6,
        }
    }

    /// The ICMP flavour carried over this protocol.
    pub fn icmp(self) -> IpNextHeaderProtocol {
        match self {
            L3::IPv4 => IpNextHeaderProtocols::Icmp,
            L3::IPv6 => IpNextHeaderProtocols::Icmpv6,
        }
    }

    /// The wildcard address used when no source address is given.
    pub fn unspecified(self) -> IpAddr {
        match self {
            L3::IPv4 => IpAddr::from([0u8; 4]),
            L3::IPv6 => IpAddr::from([0u8; 16]),
        }
    }
}

impl From<L3> for Domain {
    fn from(value: L3) -> Self {
        match value {
            L3::IPv4 => Domain::IPV4,
            L3::IPv6 => Domain::IPV6,
        }
    }
}

impl From<L3> for Protocol {
    fn from(value: L3) -> Self {
        match value {
            L3::IPv4 => Protocol::ICMPV4,
            L3::IPv6 => Protocol::ICMPV6,
        }
    }
}
