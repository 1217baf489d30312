//! A ping implementation on top of libprobe.
use std::net::IpAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use libprobe::easy::{ping, Config};

#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
struct Args {
    /// Stop after sending N echo requests.
    #[arg(short = 'c', default_value_t = 1)]
    count: u32,
    /// Wait N seconds between sending each request.
    #[arg(short = 'i', default_value_t = 1.0)]
    interval: f64,
    /// Source address.
    #[arg(short = 'I')]
    source_ip: Option<IpAddr>,
    /// Size of the echo payload in bytes.
    #[arg(short = 's', default_value_t = 56)]
    size: usize,
    /// Set the IP time to live.
    #[arg(short = 't', default_value_t = 64)]
    ttl: u8,
    /// Time to wait for a response, in seconds.
    #[arg(short = 'W', default_value_t = 1.0)]
    timeout: f64,
    /// The IP address to ping.
    #[arg(index = 1)]
    address: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config {
        timeout: Duration::from_secs_f64(args.timeout),
        interval: Duration::from_secs_f64(args.interval),
        count: args.count,
        ttl: args.ttl,
        source_ip: args.source_ip,
        size: args.size,
        ..Config::default()
    };

    let result = ping(&args.address, &config)?;
    println!("{}", result);
    println!(
        "{} packets transmitted, {} received",
        result.sent, result.received
    );
    Ok(())
}
