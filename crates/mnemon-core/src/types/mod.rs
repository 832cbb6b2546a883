//! Core types for mnemon.

mod filter;
mod observation;

pub use filter::*;
pub use observation::*;
