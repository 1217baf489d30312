//! Functions for parsing ICMP and ICMPv6 messages.
//!
//! Raw IPv4 sockets deliver the IP header with the message, use
//! [`strip_ipv4_header`] before [`parse`]. Raw IPv6 sockets deliver the
//! ICMPv6 message only.
use anyhow::{bail, Context, Result};
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::icmpv6::Icmpv6Packet;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::{icmp, icmpv6};

use crate::builder::ICMP_HEADER_SIZE;
use crate::models::L3;

/// The fields of an ICMP echo request or reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Echo<'a> {
    pub identifier: u16,
    pub sequence: u16,
    pub payload: &'a [u8],
}

/// A parsed ICMP message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Message<'a> {
    /// An echo reply.
    EchoReply(Echo<'a>),
    /// A time exceeded message, with the datagram it quotes (IP header included).
    TimeExceeded(&'a [u8]),
    /// Any other message type, which can be ignored.
    Other(u8),
}

/// Return the payload of an IPv4 packet.
pub fn strip_ipv4_header(data: &[u8]) -> Result<&[u8]> {
    let ip = Ipv4Packet::new(data).context("Cannot build IPv4 header")?;
    let header_length = ip.get_header_length() as usize * 4;
    if header_length < Ipv4Packet::minimum_packet_size() {
        bail!("Invalid IPv4 header length: {}", header_length);
    }
    data.get(header_length..)
        .context("IPv4 header length exceeds the packet size")
}

/// Parse an ICMP (IPv4) or ICMPv6 (IPv6) message.
pub fn parse(data: &[u8], l3: L3) -> Result<Message> {
    match l3 {
        L3::IPv4 => {
            let icmp = IcmpPacket::new(data).context("Cannot build ICMP header")?;
            match icmp.get_icmp_type() {
                icmp::IcmpTypes::EchoReply => parse_echo(data, l3).map(Message::EchoReply),
                // Time exceeded messages contain the original datagram 4 bytes after the checksum.
                icmp::IcmpTypes::TimeExceeded => data
                    .get(8..)
                    .map(Message::TimeExceeded)
                    .context("Cannot find quoted datagram"),
                other => Ok(Message::Other(other.0)),
            }
        }
        L3::IPv6 => {
            let icmp = Icmpv6Packet::new(data).context("Cannot build ICMPv6 header")?;
            match icmp.get_icmpv6_type() {
                icmpv6::Icmpv6Types::EchoReply => parse_echo(data, l3).map(Message::EchoReply),
                icmpv6::Icmpv6Types::TimeExceeded => data
                    .get(8..)
                    .map(Message::TimeExceeded)
                    .context("Cannot find quoted datagram"),
                other => Ok(Message::Other(other.0)),
            }
        }
    }
}

/// Parse the echo header and payload of an echo request or reply.
pub fn parse_echo(data: &[u8], l3: L3) -> Result<Echo> {
    // NOTE: EchoRequestPacket is the same as EchoReplyPacket.
    let (identifier, sequence) = match l3 {
        L3::IPv4 => {
            let echo = icmp::echo_request::EchoRequestPacket::new(data)
                .context("Cannot build ICMP Echo header")?;
            (echo.get_identifier(), echo.get_sequence_number())
        }
        L3::IPv6 => {
            let echo = icmpv6::echo_request::EchoRequestPacket::new(data)
                .context("Cannot build ICMPv6 Echo header")?;
            (echo.get_identifier(), echo.get_sequence_number())
        }
    };
    Ok(Echo {
        identifier,
        sequence,
        payload: &data[ICMP_HEADER_SIZE..],
    })
}

/// Recover the echo request quoted in a time exceeded message.
///
/// For IPv4 the quoted IP header is skipped using its header length, then the
/// start of the echo request is located by searching for `request_prefix`,
/// the leading bytes of the request that was sent (type, code and checksum).
/// For IPv6 the echo request directly follows the fixed-size quoted IPv6 header.
pub fn parse_quoted_echo<'a>(datagram: &'a [u8], l3: L3, request_prefix: &[u8]) -> Result<Echo<'a>> {
    let inner = match l3 {
        L3::IPv4 => {
            if request_prefix.is_empty() {
                bail!("Empty request prefix");
            }
            let payload = strip_ipv4_header(datagram).context("Cannot build inner IPv4 header")?;
            let index = payload
                .windows(request_prefix.len())
                .position(|window| window == request_prefix)
                .context("Cannot find the quoted echo request")?;
            &payload[index..]
        }
        L3::IPv6 => datagram
            .get(Ipv6Packet::minimum_packet_size()..)
            .context("Cannot build inner IPv6 header")?,
    };
    let echo_type = match l3 {
        L3::IPv4 => IcmpPacket::new(inner)
            .map(|packet| packet.get_icmp_type() == icmp::IcmpTypes::EchoRequest),
        L3::IPv6 => Icmpv6Packet::new(inner)
            .map(|packet| packet.get_icmpv6_type() == icmpv6::Icmpv6Types::EchoRequest),
    };
    match echo_type {
        Some(true) => parse_echo(inner, l3),
        Some(false) => bail!("Unsupported inner ICMP message type"),
        None => bail!("Cannot build inner ICMP header"),
    }
}
