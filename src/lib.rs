#![doc = include_str!("../README.md")]

pub mod builder;
pub mod easy;
pub mod engine;
pub mod error;
pub mod icmp;
pub mod identifier;
pub mod lookup;
pub mod models;
pub mod mtr;
pub mod parser;
pub mod socket;
pub mod stats;
pub mod tcp;

pub use error::{ProbeError, Result};
pub use icmp::*;
pub use identifier::*;
pub use mtr::*;
pub use tcp::*;
