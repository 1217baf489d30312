//! These tests open raw sockets: run them as root (or with CAP_NET_RAW)
//! with `cargo test -- --ignored`.
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use libprobe::engine::{EchoOutcome, EchoRequest, EchoSender, IcmpEngine, Response};
use libprobe::lookup::SystemResolver;
use libprobe::models::{IcmpExtension, MtrExtension, ProbeResult, Prober, Target};
use libprobe::{EchoIdAllocator, IcmpProber, MtrProber};

#[test]
#[ignore]
fn test_echo_loopback() {
    let engine = IcmpEngine::new().unwrap();
    let localhost: IpAddr = "127.0.0.1".parse().unwrap();
    let request = EchoRequest {
        dst_addr: localhost,
        src_addr: "0.0.0.0".parse().unwrap(),
        ttl: 64,
        identifier: 4242,
        sequence: 1,
        size: 56,
        timeout: Duration::from_secs(1),
    };
    match engine.send_echo(&request).unwrap() {
        EchoOutcome::Answered { response, from, .. } => {
            assert_eq!(response, Response::EchoReply);
            assert_eq!(from, localhost);
        }
        outcome => panic!("unexpected outcome: {:?}", outcome),
    }
}

#[test]
#[ignore]
fn test_ping_loopback() {
    let prober = IcmpProber::new().unwrap();
    let mut target = Target::new("127.0.0.1", IcmpExtension::default());
    target.count = 3;
    let result = prober.probe(&target).unwrap();
    assert!(result.is_success());
    assert_eq!(result.received, 3);
}

#[test]
#[ignore]
fn test_mtr_loopback() {
    let engine = IcmpEngine::new().unwrap();
    let prober = MtrProber::with_sender(engine, SystemResolver, Arc::new(EchoIdAllocator::new()));
    let mut target = Target::new("127.0.0.1", MtrExtension::default());
    target.count = 3;
    let result = prober.probe(&target).unwrap();
    assert!(result.reached);
    assert_eq!(result.hops.len(), 1);
    assert_eq!(result.hops[0].ttl, 1);
    assert_eq!(result.hops[0].sent, 3);
}
