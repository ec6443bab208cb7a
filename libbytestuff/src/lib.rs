//! Allocation-free byte stuffing for framed serial links.
//!
//! A frame is transmitted as `SOF <payload> EOF`, where every payload byte
//! colliding with one of the markers `SOF`, `EOF` or `ESC` is replaced by
//! `ESC` followed by the bitwise complement of that byte. The [`Stuffer`]
//! produces such frames, the [`Unstuffer`] reconstructs the payload from a
//! stream delivered in chunks of arbitrary size. Both operate exclusively on
//! buffers provided by the caller.

pub mod consts;
pub mod stuffer;
pub mod unstuffer;

#[cfg(feature = "codec")]
pub mod codec;

mod error;
pub use error::Error;

pub use stuffer::{stuffed, stuffed_len, Stuffer};
pub use unstuffer::{Feed, Status, Unstuffer};
