//! Host-side RGBA8 pixel buffer filled by a readback.

use crate::error::RenderError;
use crate::pixel::{gl_enum, BufferLayout};

/// Number of output channels of every readback.
pub const CHANNELS: usize = 4;

/// RGBA8 pixels read back from a render target.
///
/// Rows are stored in GL order (bottom row first), each `stride` bytes long
/// with `stride` a multiple of 4. The buffer length is always
/// `stride * height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    layout: BufferLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocates a zeroed RGBA8 buffer for a `width` x `height` readback.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDimensions` for a zero dimension.
    pub fn rgba8(width: u32, height: u32) -> Result<Self, RenderError> {
        let layout = BufferLayout::rgba8(width, height)
            .ok_or(RenderError::InvalidDimensions { width, height })?;
        Ok(Self {
            layout,
            data: vec![0; layout.size],
        })
    }

    /// Wraps existing bytes laid out as RGBA8 rows of the given size.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDimensions` for a zero dimension, or
    /// `RenderError::UnsupportedPixelFormat` if `data` does not have the
    /// expected length.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RenderError> {
        let layout = BufferLayout::rgba8(width, height)
            .ok_or(RenderError::InvalidDimensions { width, height })?;
        if data.len() != layout.size {
            return Err(RenderError::UnsupportedPixelFormat {
                format: gl_enum::RGBA,
                ty: gl_enum::UNSIGNED_BYTE,
            });
        }
        Ok(Self { layout, data })
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    /// Byte length of one row, including padding.
    pub fn stride(&self) -> usize {
        self.layout.stride
    }

    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access for the readback call to write into.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Returns the RGBA value at `(x, y)` in GL coordinates (origin bottom-left),
    /// or `None` if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * CHANNELS;
        let px = &self.data[offset..offset + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Iterates rows bottom-up, each trimmed to its pixel bytes.
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &[u8]> + ExactSizeIterator + '_ {
        let packed = self.layout.packed_row();
        self.data
            .chunks_exact(self.stride())
            .map(move |row| &row[..packed])
    }

    /// Returns whether every pixel equals `rgba`.
    pub fn is_uniform(&self, rgba: [u8; 4]) -> bool {
        self.rows()
            .all(|row| row.chunks_exact(CHANNELS).all(|px| px == rgba))
    }

    /// Counts pixels equal to `rgba`.
    pub fn count_matching(&self, rgba: [u8; 4]) -> usize {
        self.rows()
            .flat_map(|row| row.chunks_exact(CHANNELS))
            .filter(|px| *px == rgba)
            .count()
    }
}
