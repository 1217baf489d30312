use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use libprobe::builder::build_echo_request;
use libprobe::engine::{Matcher, PacketSource, Response};
use libprobe::models::L3;
use libprobe::parser::{parse, parse_echo, parse_quoted_echo, strip_ipv4_header, Message};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::MutableIpv4Packet;

/// An IPv4 datagram as delivered by a raw socket.
fn ipv4_datagram(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0u8; 20 + payload.len()];
    let mut ip = MutableIpv4Packet::new(&mut buffer).unwrap();
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length((20 + payload.len()) as u16);
    ip.set_ttl(1);
    ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
    ip.set_source(src);
    ip.set_destination(dst);
    ip.set_payload(payload);
    buffer
}

/// An ICMP time exceeded message quoting `datagram`.
fn time_exceeded(l3: L3, datagram: &[u8]) -> Vec<u8> {
    let icmp_type = match l3 {
        L3::IPv4 => 11,
        L3::IPv6 => 3,
    };
    let mut message = vec![icmp_type, 0, 0, 0, 0, 0, 0, 0];
    message.extend_from_slice(datagram);
    message
}

fn echo_reply(l3: L3, identifier: u16, sequence: u16) -> Vec<u8> {
    let mut reply = build_echo_request(l3, identifier, sequence, 56).unwrap();
    reply[0] = match l3 {
        L3::IPv4 => 0,
        L3::IPv6 => 129,
    };
    reply
}

#[test]
fn test_parse_ipv4_echo_reply() {
    let reply = echo_reply(L3::IPv4, 24000, 3);
    let packet = ipv4_datagram(Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(192, 0, 2, 1), &reply);

    let data = strip_ipv4_header(&packet).unwrap();
    match parse(data, L3::IPv4).unwrap() {
        Message::EchoReply(echo) => {
            assert_eq!(echo.identifier, 24000);
            assert_eq!(echo.sequence, 3);
            assert_eq!(echo.payload.len(), 56);
            assert_eq!(&echo.payload[..5], &[3, 0, 0, 0, b'x']);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_parse_ipv4_time_exceeded() {
    let request = build_echo_request(L3::IPv4, 24000, 3, 56).unwrap();
    let quoted = ipv4_datagram(Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(8, 8, 8, 8), &request);
    let message = time_exceeded(L3::IPv4, &quoted);
    let packet = ipv4_datagram(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(192, 0, 2, 1), &message);

    let data = strip_ipv4_header(&packet).unwrap();
    let datagram = match parse(data, L3::IPv4).unwrap() {
        Message::TimeExceeded(datagram) => datagram,
        other => panic!("unexpected message: {:?}", other),
    };
    assert_eq!(datagram, quoted.as_slice());

    let echo = parse_quoted_echo(datagram, L3::IPv4, &request[..4]).unwrap();
    assert_eq!(echo.identifier, 24000);
    assert_eq!(echo.sequence, 3);
}

#[test]
fn test_parse_ipv4_time_exceeded_prefix_in_header() {
    // The destination address of the quoted header holds the same bytes as
    // the start of the request.
    let request = build_echo_request(L3::IPv4, 24000, 3, 56).unwrap();
    let dst = Ipv4Addr::new(request[0], request[1], request[2], request[3]);
    let quoted = ipv4_datagram(Ipv4Addr::new(192, 0, 2, 1), dst, &request);
    let message = time_exceeded(L3::IPv4, &quoted);

    let echo = match parse(&message, L3::IPv4).unwrap() {
        Message::TimeExceeded(datagram) => {
            parse_quoted_echo(datagram, L3::IPv4, &request[..4]).unwrap()
        }
        other => panic!("unexpected message: {:?}", other),
    };
    assert_eq!(echo.identifier, 24000);
    assert_eq!(echo.sequence, 3);

    let matcher = Matcher::new(L3::IPv4, 24000, 3, &request);
    assert_eq!(matcher.matches(&message).unwrap(), Some(Response::TimeExceeded));
}

#[test]
fn test_parse_ipv4_time_exceeded_truncated_quote() {
    // Routers are only required to quote the first 8 bytes of the datagram.
    let request = build_echo_request(L3::IPv4, 24000, 3, 56).unwrap();
    let quoted = ipv4_datagram(Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(8, 8, 8, 8), &request);
    let message = time_exceeded(L3::IPv4, &quoted[..28]);

    let echo = match parse(&message, L3::IPv4).unwrap() {
        Message::TimeExceeded(datagram) => {
            parse_quoted_echo(datagram, L3::IPv4, &request[..4]).unwrap()
        }
        other => panic!("unexpected message: {:?}", other),
    };
    assert_eq!(echo.identifier, 24000);
    assert_eq!(echo.sequence, 3);
    assert!(echo.payload.is_empty());
}

#[test]
fn test_parse_ipv6_time_exceeded() {
    let request = build_echo_request(L3::IPv6, 1234, 9, 56).unwrap();
    // The quoted IPv6 header is not inspected.
    let mut quoted = vec![0x60; 40];
    quoted.extend_from_slice(&request);
    let message = time_exceeded(L3::IPv6, &quoted);

    let echo = match parse(&message, L3::IPv6).unwrap() {
        Message::TimeExceeded(datagram) => parse_quoted_echo(datagram, L3::IPv6, &[]).unwrap(),
        other => panic!("unexpected message: {:?}", other),
    };
    assert_eq!(echo.identifier, 1234);
    assert_eq!(echo.sequence, 9);
}

#[test]
fn test_parse_ipv6_echo_reply() {
    let reply = echo_reply(L3::IPv6, 1234, 9);
    match parse(&reply, L3::IPv6).unwrap() {
        Message::EchoReply(echo) => {
            assert_eq!(echo.identifier, 1234);
            assert_eq!(echo.sequence, 9);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_request_seen_by_peer() {
    for l3 in [L3::IPv4, L3::IPv6] {
        for (identifier, sequence) in [(0, 0), (1, 65535), (65534, 42)] {
            let request = build_echo_request(l3, identifier, sequence, 56).unwrap();
            let echo = parse_echo(&request, l3).unwrap();
            assert_eq!((echo.identifier, echo.sequence), (identifier, sequence));
        }
    }
}

#[test]
fn test_parse_malformed() {
    assert!(parse(&[], L3::IPv4).is_err());
    assert!(parse(&[129], L3::IPv6).is_err());
    assert!(strip_ipv4_header(&[]).is_err());
    // Header length smaller than the minimum.
    assert!(strip_ipv4_header(&[0x41; 20]).is_err());
    // Header length larger than the packet.
    assert!(strip_ipv4_header(&[0x4f; 20]).is_err());
    // Quoted datagram without the request.
    assert!(parse_quoted_echo(&[0x45; 30], L3::IPv4, &[8, 0, 1, 2]).is_err());
}

/// Replays captured packets, then times out.
struct Replay {
    from: IpAddr,
    packets: RefCell<VecDeque<Vec<u8>>>,
}

impl Replay {
    fn new(from: IpAddr, packets: Vec<Vec<u8>>) -> Self {
        Replay {
            from,
            packets: RefCell::new(packets.into()),
        }
    }
}

impl PacketSource for Replay {
    fn recv_from(
        &self,
        buffer: &mut [u8],
        _deadline: Instant,
    ) -> libprobe::Result<Option<(usize, IpAddr)>> {
        Ok(self.packets.borrow_mut().pop_front().map(|packet| {
            buffer[..packet.len()].copy_from_slice(&packet);
            (packet.len(), self.from)
        }))
    }
}

#[test]
fn test_wait_skips_malformed_packets() {
    let src = Ipv4Addr::new(8, 8, 8, 8);
    let dst = Ipv4Addr::new(192, 0, 2, 1);
    let request = build_echo_request(L3::IPv4, 24000, 3, 56).unwrap();
    let matcher = Matcher::new(L3::IPv4, 24000, 3, &request);
    let deadline = Instant::now() + Duration::from_secs(1);

    let source = Replay::new(
        IpAddr::V4(src),
        vec![
            // Truncated IPv4 header.
            vec![0x45, 0, 0],
            // Time exceeded quoting garbage.
            ipv4_datagram(src, dst, &time_exceeded(L3::IPv4, &[1, 2, 3])),
            // Reply to another request.
            ipv4_datagram(src, dst, &echo_reply(L3::IPv4, 24001, 3)),
            ipv4_datagram(src, dst, &echo_reply(L3::IPv4, 24000, 3)),
        ],
    );
    assert_eq!(
        matcher.wait_for(&source, deadline).unwrap(),
        Some((Response::EchoReply, IpAddr::V4(src)))
    );
}

#[test]
fn test_wait_time_exceeded() {
    let router = Ipv4Addr::new(10, 0, 0, 1);
    let src = Ipv4Addr::new(192, 0, 2, 1);
    let dst = Ipv4Addr::new(8, 8, 8, 8);
    let request = build_echo_request(L3::IPv4, 24000, 3, 56).unwrap();
    let matcher = Matcher::new(L3::IPv4, 24000, 3, &request);
    let deadline = Instant::now() + Duration::from_secs(1);

    let other = build_echo_request(L3::IPv4, 24000, 4, 56).unwrap();
    let source = Replay::new(
        IpAddr::V4(router),
        vec![
            // Quotes a request with another sequence number.
            ipv4_datagram(router, src, &time_exceeded(L3::IPv4, &ipv4_datagram(src, dst, &other))),
            ipv4_datagram(router, src, &time_exceeded(L3::IPv4, &ipv4_datagram(src, dst, &request))),
        ],
    );
    assert_eq!(
        matcher.wait_for(&source, deadline).unwrap(),
        Some((Response::TimeExceeded, IpAddr::V4(router)))
    );
}

#[test]
fn test_wait_ipv6() {
    let router: IpAddr = "2001:db8::1".parse().unwrap();
    let request = build_echo_request(L3::IPv6, 1234, 9, 56).unwrap();
    let matcher = Matcher::new(L3::IPv6, 1234, 9, &request);
    let deadline = Instant::now() + Duration::from_secs(1);

    let quote = |request: &[u8]| {
        let mut quoted = vec![0x60; 40];
        quoted.extend_from_slice(request);
        time_exceeded(L3::IPv6, &quoted)
    };
    let other = build_echo_request(L3::IPv6, 1234, 10, 56).unwrap();

    let source = Replay::new(
        router,
        vec![
            // Quotes a request with another sequence number.
            quote(&other),
            // Quoted request truncated inside the IPv6 header.
            time_exceeded(L3::IPv6, &[0x60; 20]),
            quote(&request),
        ],
    );
    assert_eq!(
        matcher.wait_for(&source, deadline).unwrap(),
        Some((Response::TimeExceeded, router))
    );

    let target: IpAddr = "2001:db8::2".parse().unwrap();
    let source = Replay::new(
        target,
        vec![
            // Reply to another request.
            echo_reply(L3::IPv6, 1235, 9),
            // Same identifier, other correlation token.
            echo_reply(L3::IPv6, 1234, 10),
            echo_reply(L3::IPv6, 1234, 9),
        ],
    );
    assert_eq!(
        matcher.wait_for(&source, deadline).unwrap(),
        Some((Response::EchoReply, target))
    );
}

#[test]
fn test_wait_timeout() {
    let request = build_echo_request(L3::IPv6, 1, 1, 56).unwrap();
    let matcher = Matcher::new(L3::IPv6, 1, 1, &request);
    let deadline = Instant::now() + Duration::from_millis(10);
    let source = Replay::new(
        "2001:db8::1".parse().unwrap(),
        vec![vec![0xff; 3], echo_reply(L3::IPv6, 2, 1)],
    );
    assert_eq!(matcher.wait_for(&source, deadline).unwrap(), None);
}
