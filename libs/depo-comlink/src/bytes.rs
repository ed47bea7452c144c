//! Register word-order handling
//!
//! 32-bit floats occupy two consecutive 16-bit registers. Controllers
//! disagree on the order of the words and bytes, so the order is configured
//! per link via [`ByteOrder`].

pub mod byte_order;
pub mod conversions;

pub use byte_order::ByteOrder;
pub use conversions::*;
