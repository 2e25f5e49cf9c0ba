#![deny(unsafe_code)]
//! Frame sinks for offscreen-gl: turns read-back [`PixelBuffer`]s into image
//! files.
//!
//! Row packing lives in [`pixel`] (always available); PNG encoding through
//! the `image` crate is in [`snapshot`] behind the `png` feature (default on).
//!
//! [`PixelBuffer`]: offscreen_gl_core::PixelBuffer

pub mod pixel;

#[cfg(feature = "png")]
pub mod snapshot;

pub use pixel::{tight_rows, RowOrder};

#[cfg(feature = "png")]
pub use snapshot::{write_png, PngSink};
