//! Send one echo request and wait for the matching reply.
//!
//! Each call opens its own raw socket, with its own TTL and deadline, and
//! closes it before returning. A reply is matched either:
//! - directly, by an echo reply carrying the request identifier and correlation token;
//! - indirectly, by a time exceeded message quoting the request identifier and sequence.
//!
//! Other and malformed packets are ignored until the deadline.
use std::net::IpAddr;
use std::time::{Duration, Instant};

use anyhow::Result as ParseResult;
use log::{debug, trace};

use crate::builder::{build_echo_request, correlation_token, TOKEN_SIZE};
use crate::error::{ProbeError, Result};
use crate::models::L3;
use crate::parser::{parse, parse_quoted_echo, strip_ipv4_header, Message};
use crate::socket::{check_capability, IcmpSocket, RECV_BUFFER_SIZE};

/// The parameters of one echo request.
#[derive(Clone, Debug)]
pub struct EchoRequest {
    pub dst_addr: IpAddr,
    /// Source address, or the wildcard address of the family.
    pub src_addr: IpAddr,
    pub ttl: u8,
    pub identifier: u16,
    pub sequence: u16,
    /// Requested payload size.
    pub size: usize,
    pub timeout: Duration,
}

impl EchoRequest {
    pub fn l3_protocol(&self) -> L3 {
        L3::of(self.dst_addr)
    }
}

/// The kind of message that answered a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// The destination answered.
    EchoReply,
    /// A router on the path dropped the request.
    TimeExceeded,
}

/// The outcome of an echo request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EchoOutcome {
    Answered {
        response: Response,
        from: IpAddr,
        rtt: Duration,
    },
    /// No matching reply before the deadline.
    Timeout { elapsed: Duration },
}

impl EchoOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EchoOutcome::Answered { .. })
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            EchoOutcome::Answered { rtt, .. } => *rtt,
            EchoOutcome::Timeout { elapsed } => *elapsed,
        }
    }

    /// The address of the host that answered, if any.
    pub fn responder(&self) -> Option<IpAddr> {
        match self {
            EchoOutcome::Answered { from, .. } => Some(*from),
            EchoOutcome::Timeout { .. } => None,
        }
    }
}

/// Something that can send an echo request and wait for its reply.
pub trait EchoSender {
    /// Send the request and block until the matching reply or the deadline.
    ///
    /// Errors are reserved for setup failures and non-temporary I/O errors;
    /// an unanswered request is an [`EchoOutcome::Timeout`].
    fn send_echo(&self, request: &EchoRequest) -> Result<EchoOutcome>;
}

impl<T: EchoSender + ?Sized> EchoSender for &T {
    fn send_echo(&self, request: &EchoRequest) -> Result<EchoOutcome> {
        (**self).send_echo(request)
    }
}

/// A source of received packets, as delivered by a raw socket
/// (with the IP header for IPv4, without for IPv6).
pub trait PacketSource {
    /// Wait for the next packet until `deadline`, see [`IcmpSocket::recv_from`].
    fn recv_from(&self, buffer: &mut [u8], deadline: Instant) -> Result<Option<(usize, IpAddr)>>;
}

impl PacketSource for IcmpSocket {
    fn recv_from(&self, buffer: &mut [u8], deadline: Instant) -> Result<Option<(usize, IpAddr)>> {
        IcmpSocket::recv_from(self, buffer, deadline)
    }
}

/// Matches incoming ICMP messages against one request.
pub struct Matcher {
    l3: L3,
    identifier: u16,
    sequence: u16,
    token: [u8; TOKEN_SIZE],
    request_prefix: [u8; 4],
}

impl Matcher {
    /// Build a matcher for the request encoded in `request` (the ICMP message sent).
    pub fn new(l3: L3, identifier: u16, sequence: u16, request: &[u8]) -> Self {
        let mut request_prefix = [0u8; 4];
        let len = request.len().min(4);
        request_prefix[..len].copy_from_slice(&request[..len]);
        Matcher {
            l3,
            identifier,
            sequence,
            token: correlation_token(sequence),
            request_prefix,
        }
    }

    /// Check an ICMP message (without IP header).
    ///
    /// Returns an error if the message cannot be parsed, and `None` if it does
    /// not answer the request.
    pub fn matches(&self, data: &[u8]) -> ParseResult<Option<Response>> {
        match parse(data, self.l3)? {
            Message::EchoReply(echo) => {
                if echo.identifier == self.identifier
                    && echo.payload.get(..TOKEN_SIZE) == Some(&self.token[..])
                {
                    Ok(Some(Response::EchoReply))
                } else {
                    Ok(None)
                }
            }
            Message::TimeExceeded(datagram) => {
                let echo = parse_quoted_echo(datagram, self.l3, &self.request_prefix)?;
                if echo.identifier == self.identifier && echo.sequence == self.sequence {
                    Ok(Some(Response::TimeExceeded))
                } else {
                    Ok(None)
                }
            }
            Message::Other(_) => Ok(None),
        }
    }

    /// Read packets from `source` until one answers the request or the deadline elapses.
    ///
    /// Packets that cannot be parsed or that do not match are discarded.
    pub fn wait_for<P: PacketSource>(
        &self,
        source: &P,
        deadline: Instant,
    ) -> Result<Option<(Response, IpAddr)>> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        while let Some((size, from)) = source.recv_from(&mut buffer, deadline)? {
            let packet = &buffer[..size];
            let data = match self.l3 {
                L3::IPv4 => strip_ipv4_header(packet),
                L3::IPv6 => Ok(packet),
            };
            match data.and_then(|data| self.matches(data)) {
                Ok(Some(response)) => return Ok(Some((response, from))),
                Ok(None) => trace!("ignored packet from={}", from),
                Err(error) => trace!(
                    "unparseable packet from={} error={} data={}",
                    from,
                    error,
                    hex::encode(packet)
                ),
            }
        }
        Ok(None)
    }
}

/// Sends echo requests over raw sockets.
#[derive(Debug)]
pub struct IcmpEngine {
    ipv4: bool,
    ipv6: bool,
}

impl IcmpEngine {
    /// Build an engine, checking that raw ICMP sockets can be opened.
    ///
    /// Fails if neither IPv4 nor IPv6 raw sockets are available.
    pub fn new() -> Result<Self> {
        let ipv4 = check_capability(L3::IPv4);
        let ipv6 = check_capability(L3::IPv6);
        match (ipv4, ipv6) {
            (Err(error), Err(_)) => Err(error),
            (ipv4, ipv6) => {
                debug!("raw sockets ipv4={} ipv6={}", ipv4.is_ok(), ipv6.is_ok());
                Ok(IcmpEngine {
                    ipv4: ipv4.is_ok(),
                    ipv6: ipv6.is_ok(),
                })
            }
        }
    }

    pub fn supports(&self, l3: L3) -> bool {
        match l3 {
            L3::IPv4 => self.ipv4,
            L3::IPv6 => self.ipv6,
        }
    }
}

impl EchoSender for IcmpEngine {
    fn send_echo(&self, request: &EchoRequest) -> Result<EchoOutcome> {
        let l3 = request.l3_protocol();
        if !self.supports(l3) {
            return Err(ProbeError::Unsupported(format!(
                "raw {:?} sockets are not available",
                l3
            )));
        }
        if L3::of(request.src_addr) != l3 {
            return Err(ProbeError::InvalidTarget(format!(
                "source address {} does not match destination {}",
                request.src_addr, request.dst_addr
            )));
        }

        let message = build_echo_request(l3, request.identifier, request.sequence, request.size)?;

        let socket = IcmpSocket::open(l3, request.src_addr)?;
        socket.set_hop_limit(request.ttl)?;

        let matcher = Matcher::new(l3, request.identifier, request.sequence, &message);

        let start = Instant::now();
        let deadline = start + request.timeout;
        socket.send_to(&message, request.dst_addr)?;
        debug!(
            "sent echo dst_addr={} ttl={} id={} seq={}",
            request.dst_addr, request.ttl, request.identifier, request.sequence
        );

        let outcome = match matcher.wait_for(&socket, deadline)? {
            Some((response, from)) => {
                let rtt = start.elapsed();
                debug!("matched {:?} from={} rtt={:?}", response, from, rtt);
                EchoOutcome::Answered {
                    response,
                    from,
                    rtt,
                }
            }
            None => EchoOutcome::Timeout {
                elapsed: start.elapsed(),
            },
        };
        Ok(outcome)
    }
}
