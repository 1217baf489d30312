//! Functions for building echo request packets.
//!
//! Only the ICMP message is built, the IP header is written by the kernel.
//!
//! # Examples
//!
//! ```
//! use libprobe::builder::{build_icmp, Packet, TOKEN_SIZE};
//! use libprobe::models::L3;
//!
//! let mut buffer = [0u8; 1500];
//! let mut packet = Packet::new(&mut buffer, L3::IPv4, TOKEN_SIZE);
//!
//! build_icmp(&mut packet, 42, 1);
//!
//! println!("{:?}", packet.l4());
//! ```
mod builders;
mod packet;

pub use builders::*;
pub use packet::*;
