//! Defines common types used by all bytetrawl `crate`s.

pub use quantities::{AbsoluteOffset, Len};

mod quantities;
