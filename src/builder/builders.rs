use pnet::packet::icmp::IcmpPacket;
use pnet::packet::{icmp, icmpv6};

use crate::builder::{Packet, ICMP_HEADER_SIZE};
use crate::error::{ProbeError, Result};
use crate::models::L3;

/// Byte appended to the sequence number in the correlation token.
pub const TOKEN_MARKER: u8 = b'x';
/// Size of the correlation token at the start of the echo payload.
pub const TOKEN_SIZE: usize = 5;
/// Largest echo payload in an IPv4 datagram (65535 - IPv4 header - ICMP header).
pub const MAX_PAYLOAD_SIZE_V4: usize = 65507;
/// Largest echo payload in an IPv6 packet (65535 - ICMPv6 header).
pub const MAX_PAYLOAD_SIZE_V6: usize = 65527;

/// The correlation token carried at the start of the echo payload:
/// the sequence number as a little-endian 32-bit integer, followed by a marker byte.
///
/// Echo replies are matched on this token in addition to the echo identifier,
/// since the identifier may be rewritten by NAT devices.
pub fn correlation_token(sequence: u16) -> [u8; TOKEN_SIZE] {
    let mut token = [TOKEN_MARKER; TOKEN_SIZE];
    token[..4].copy_from_slice(&(sequence as u32).to_le_bytes());
    token
}

/// The payload size for a requested size: never smaller than the token.
pub fn payload_size(size: usize) -> usize {
    size.max(TOKEN_SIZE)
}

/// The largest echo payload that fits in a packet of the given family.
pub fn max_payload_size(l3: L3) -> usize {
    match l3 {
        L3::IPv4 => MAX_PAYLOAD_SIZE_V4,
        L3::IPv6 => MAX_PAYLOAD_SIZE_V6,
    }
}

/// Check that a requested payload size fits in a packet of the given family.
pub fn check_payload_size(l3: L3, size: usize) -> Result<()> {
    if size > max_payload_size(l3) {
        return Err(ProbeError::InvalidTarget(format!(
            "payload size {} exceeds the {:?} maximum of {} bytes",
            size,
            l3,
            max_payload_size(l3)
        )));
    }
    Ok(())
}

/// Build the ICMP Echo Request header and payload.
pub fn build_icmp(packet: &mut Packet, identifier: u16, sequence: u16) {
    write_payload(packet, sequence);
    let mut echo = icmp::echo_request::MutableEchoRequestPacket::new(packet.l4_mut())
        .expect("packet holds an echo header");
    echo.set_icmp_type(icmp::IcmpTypes::EchoRequest);
    echo.set_icmp_code(icmp::echo_request::IcmpCodes::NoCode);
    echo.set_identifier(identifier);
    echo.set_sequence_number(sequence);
    echo.set_checksum(0);
    let checksum = icmp::checksum(&IcmpPacket::new(packet.l4()).expect("packet holds an ICMP header"));
    let mut echo = icmp::echo_request::MutableEchoRequestPacket::new(packet.l4_mut())
        .expect("packet holds an echo header");
    echo.set_checksum(checksum);
}

/// Build the ICMPv6 Echo Request header and payload.
///
/// The checksum covers a pseudo-header with the source address chosen by the
/// kernel, so it is left to zero and computed by the kernel on raw ICMPv6 sockets.
pub fn build_icmpv6(packet: &mut Packet, identifier: u16, sequence: u16) {
    write_payload(packet, sequence);
    let mut echo = icmpv6::echo_request::MutableEchoRequestPacket::new(packet.l4_mut())
        .expect("packet holds an echo header");
    echo.set_icmpv6_type(icmpv6::Icmpv6Types::EchoRequest);
    echo.set_icmpv6_code(icmpv6::echo_request::Icmpv6Codes::NoCode);
    echo.set_identifier(identifier);
    echo.set_sequence_number(sequence);
    echo.set_checksum(0);
}

/// Build an echo request for the given address family in a new buffer.
///
/// Fails if the payload does not fit in a single packet.
pub fn build_echo_request(l3: L3, identifier: u16, sequence: u16, size: usize) -> Result<Vec<u8>> {
    check_payload_size(l3, size)?;
    let payload_size = payload_size(size);
    let length = ICMP_HEADER_SIZE.checked_add(payload_size).ok_or_else(|| {
        ProbeError::InvalidTarget(format!("payload size {} is too large", size))
    })?;
    let mut buffer = vec![0u8; length];
    let mut packet = Packet::new(&mut buffer, l3, payload_size);
    match l3 {
        L3::IPv4 => build_icmp(&mut packet, identifier, sequence),
        L3::IPv6 => build_icmpv6(&mut packet, identifier, sequence),
    }
    Ok(buffer)
}

/// Write the correlation token followed by a fill pattern.
fn write_payload(packet: &mut Packet, sequence: u16) {
    let payload = packet.payload_mut();
    payload[..TOKEN_SIZE].copy_from_slice(&correlation_token(sequence));
    for (i, byte) in payload[TOKEN_SIZE..].iter_mut().enumerate() {
        *byte = (i & 0xFF) as u8;
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{
        build_echo_request, check_payload_size, correlation_token, payload_size, TOKEN_SIZE,
    };
    use crate::error::ProbeError;
    use crate::models::L3;

    #[test]
    fn test_correlation_token() {
        assert_eq!(correlation_token(1), [1, 0, 0, 0, b'x']);
        assert_eq!(correlation_token(0x0102), [2, 1, 0, 0, b'x']);
    }

    #[test]
    fn test_payload_size() {
        assert_eq!(payload_size(0), TOKEN_SIZE);
        assert_eq!(payload_size(56), 56);
    }

    #[test]
    fn test_payload_size_limits() {
        assert!(check_payload_size(L3::IPv4, 65507).is_ok());
        assert!(check_payload_size(L3::IPv4, 65508).is_err());
        assert!(check_payload_size(L3::IPv6, 65527).is_ok());
        assert!(check_payload_size(L3::IPv6, 65528).is_err());
        assert_eq!(build_echo_request(L3::IPv4, 1, 1, 65507).unwrap().len(), 65515);
    }

    #[test]
    fn test_oversized_request() {
        assert!(matches!(
            build_echo_request(L3::IPv4, 1, 1, usize::MAX),
            Err(ProbeError::InvalidTarget(_))
        ));
        assert!(matches!(
            build_echo_request(L3::IPv6, 1, 1, 65528),
            Err(ProbeError::InvalidTarget(_))
        ));
    }
}
