//! Packs a read-back [`PixelBuffer`] into tightly packed RGBA8 rows.
//!
//! GL returns rows bottom-up with each row padded to a 4-byte stride; image
//! encoders want `width * 4` bytes per row with no padding, usually top-down.

use offscreen_gl_core::buffer::{PixelBuffer, CHANNELS};
use std::str::FromStr;

/// Order in which rows are written to the output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// Rows as `glReadPixels` returned them: bottom row first. The image
    /// appears vertically flipped in a viewer.
    #[default]
    AsRead,
    /// Top row first, the way the scene looks on screen.
    TopDown,
}

impl RowOrder {
    pub fn from_flip(flip: bool) -> Self {
        if flip {
            RowOrder::TopDown
        } else {
            RowOrder::AsRead
        }
    }
}

impl FromStr for RowOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "as-read" => Ok(RowOrder::AsRead),
            "top-down" => Ok(RowOrder::TopDown),
            other => Err(format!(
                "unknown row order '{other}' (expected as-read or top-down)"
            )),
        }
    }
}

/// Copies `frame` into `width * height * 4` bytes with no row padding, in
/// the given row order.
pub fn tight_rows(frame: &PixelBuffer, order: RowOrder) -> Vec<u8> {
    let row_len = frame.width() as usize * CHANNELS;
    let mut out = Vec::with_capacity(row_len * frame.height() as usize);
    match order {
        RowOrder::AsRead => frame.rows().for_each(|row| out.extend_from_slice(row)),
        RowOrder::TopDown => frame
            .rows()
            .rev()
            .for_each(|row| out.extend_from_slice(row)),
    }
    out
}
