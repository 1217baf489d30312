//! Data structures for describing probe targets and results.
mod protocols;
mod result;
mod target;

pub use protocols::*;
pub use result::*;
pub use target::*;
