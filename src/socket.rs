//! Raw ICMP sockets.
//!
//! Raw sockets require elevated privileges on most platforms (root, or
//! `CAP_NET_RAW` on Linux). Failures to open or configure a socket are
//! reported as [`ProbeError::Setup`].
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use log::debug;
use socket2::{SockAddr, Socket, Type};

use crate::error::{ProbeError, Result};
use crate::models::L3;

/// Size of the receive buffer, enough for any reply on an Ethernet path.
pub const RECV_BUFFER_SIZE: usize = 1500;

/// Check that a raw ICMP socket can be opened for the given address family.
pub fn check_capability(l3: L3) -> Result<()> {
    open_raw(l3).map(|_| ())
}

fn open_raw(l3: L3) -> Result<Socket> {
    Socket::new(l3.into(), Type::RAW, Some(l3.into()))
        .map_err(ProbeError::setup("open raw socket (root or CAP_NET_RAW required)"))
}

/// A raw ICMP socket, closed when dropped.
pub struct IcmpSocket {
    socket: Socket,
    l3: L3,
}

impl IcmpSocket {
    /// Open a raw socket bound to `source` (which may be the wildcard address).
    pub fn open(l3: L3, source: IpAddr) -> Result<Self> {
        let socket = open_raw(l3)?;
        socket
            .bind(&SockAddr::from(SocketAddr::new(source, 0)))
            .map_err(ProbeError::setup("bind source address"))?;
        debug!("opened raw {:?} socket bound to {}", l3, source);
        Ok(IcmpSocket { socket, l3 })
    }

    pub fn l3_protocol(&self) -> L3 {
        self.l3
    }

    /// Set the TTL (IPv4) or the unicast hop limit (IPv6) of outgoing packets.
    pub fn set_hop_limit(&self, ttl: u8) -> Result<()> {
        let result = match self.l3 {
            L3::IPv4 => self.socket.set_ttl(ttl as u32),
            L3::IPv6 => self.socket.set_unicast_hops_v6(ttl as u32),
        };
        result.map_err(ProbeError::setup("set hop limit"))
    }

    /// Send an ICMP message to `dst_addr`.
    pub fn send_to(&self, data: &[u8], dst_addr: IpAddr) -> Result<()> {
        self.socket
            .send_to(data, &SockAddr::from(SocketAddr::new(dst_addr, 0)))?;
        Ok(())
    }

    /// Wait for the next packet until `deadline`.
    ///
    /// Return the number of bytes written in `buffer` and the source address,
    /// or `None` if the deadline elapsed first.
    pub fn recv_from(&self, buffer: &mut [u8], deadline: Instant) -> Result<Option<(usize, IpAddr)>> {
        // SAFETY: `buffer` is initialized and the socket only writes initialized bytes to it.
        let uninit = unsafe { &mut *(buffer as *mut [u8] as *mut [MaybeUninit<u8>]) };
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            // A zero timeval would block forever.
            let remaining = remaining.max(Duration::from_micros(1));
            self.socket
                .set_read_timeout(Some(remaining))
                .map_err(ProbeError::setup("set read deadline"))?;
            match self.socket.recv_from(uninit) {
                Ok((size, addr)) => match addr.as_socket() {
                    Some(addr) => return Ok(Some((size, addr.ip()))),
                    None => continue,
                },
                Err(error) if is_temporary(&error) => continue,
                Err(error) => return Err(error.into()),
            }
        }
    }
}

/// Errors after which the socket can still be read.
fn is_temporary(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
