//! An mtr-like report on top of libprobe: discover the path to one or more
//! hosts and print the statistics of every hop.
use std::net::IpAddr;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use dns_lookup::lookup_host;
use libprobe::easy::{mtr_many, Config};

#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
struct Args {
    /// Use IPv4 only.
    #[arg(group = "af", short = '4', default_value_t = false)]
    ipv4: bool,
    /// Use IPv6 only.
    #[arg(group = "af", short = '6', default_value_t = false)]
    ipv6: bool,
    /// Number of probes sent to the destination once reached.
    #[arg(short = 'c', long = "report-cycles", default_value_t = 10)]
    count: u32,
    /// Delay in seconds between the probes sent to the destination.
    #[arg(short = 'i', long = "interval", default_value_t = 0.0)]
    interval: f64,
    /// Set the max number of hops (max TTL to be reached).
    #[arg(short = 'm', long = "max-ttl", default_value_t = 30)]
    max_hops: u8,
    /// Do not resolve IP addresses to their domain names.
    #[arg(short = 'n', long = "no-dns", default_value_t = false)]
    do_not_resolve: bool,
    /// Size of the echo payload in bytes.
    #[arg(short = 's', long = "psize", default_value_t = 56)]
    size: usize,
    /// Source address.
    #[arg(short = 'a', long = "address")]
    source_ip: Option<IpAddr>,
    /// Wait for a reply no more than N seconds.
    #[arg(short = 'w', long = "timeout", default_value_t = 1.0)]
    timeout: f64,
    /// The hosts to probe.
    #[arg(required = true)]
    hosts: Vec<String>,
}

fn resolve(host: &str, args: &Args) -> Result<String> {
    if let Ok(addr) = host.parse::<IpAddr>() {
        return Ok(addr.to_string());
    }
    let addr = lookup_host(host)?
        .into_iter()
        .filter(|addr| !(addr.is_ipv4() && args.ipv6))
        .find(|addr| !(addr.is_ipv6() && args.ipv4));
    match addr {
        Some(addr) => Ok(addr.to_string()),
        None => bail!("{}: no address found", host),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let addresses = args
        .hosts
        .iter()
        .map(|host| resolve(host, &args))
        .collect::<Result<Vec<_>>>()?;

    let config = Config {
        timeout: Duration::from_secs_f64(args.timeout),
        interval: Duration::from_secs_f64(args.interval),
        count: args.count,
        source_ip: args.source_ip,
        enable_v6: !args.ipv4,
        size: args.size,
        max_hops: args.max_hops,
        resolve_ptr: !args.do_not_resolve,
        ..Config::default()
    };

    let addresses: Vec<&str> = addresses.iter().map(String::as_str).collect();
    for (host, result) in args.hosts.iter().zip(mtr_many(&addresses, &config)?) {
        match result {
            Ok(result) => println!("{}", result),
            Err(error) => println!("{}: {}", host, error),
        }
    }
    Ok(())
}
