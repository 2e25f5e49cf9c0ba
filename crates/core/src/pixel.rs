//! Pixel size and row layout math for GL readback buffers.
//!
//! Pure functions over raw GL enum values so the layout contract can be
//! checked without a GPU. Unknown formats and types yield a size of 0 and a
//! logged diagnostic; callers treat 0 as "cannot allocate".

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Row alignment (in bytes) of every host-side pixel buffer.
pub const ROW_ALIGNMENT: usize = 4;

/// Raw GL enum values used by the layout math.
///
/// These match the `GL_*` / `GL_*_OES` / `GL_*_EXT` constants of the
/// OpenGL ES headers.
pub mod gl_enum {
    pub const BYTE: u32 = 0x1400;
    pub const UNSIGNED_BYTE: u32 = 0x1401;
    pub const SHORT: u32 = 0x1402;
    pub const UNSIGNED_SHORT: u32 = 0x1403;
    pub const INT: u32 = 0x1404;
    pub const UNSIGNED_INT: u32 = 0x1405;
    pub const FLOAT: u32 = 0x1406;
    pub const FIXED: u32 = 0x140C;
    pub const UNSIGNED_SHORT_4_4_4_4: u32 = 0x8033;
    pub const UNSIGNED_SHORT_5_5_5_1: u32 = 0x8034;
    pub const UNSIGNED_SHORT_5_6_5: u32 = 0x8363;
    pub const RGBA4_OES: u32 = 0x8056;
    pub const RGB5_A1_OES: u32 = 0x8057;
    pub const RGB565_OES: u32 = 0x8D62;
    pub const UNSIGNED_INT_24_8_OES: u32 = 0x84FA;

    pub const DEPTH_COMPONENT: u32 = 0x1902;
    pub const ALPHA: u32 = 0x1906;
    pub const RGB: u32 = 0x1907;
    pub const RGBA: u32 = 0x1908;
    pub const LUMINANCE: u32 = 0x1909;
    pub const LUMINANCE_ALPHA: u32 = 0x190A;
    pub const BGRA_EXT: u32 = 0x80E1;
    pub const DEPTH_STENCIL_OES: u32 = 0x84F9;
}

/// How a pixel type contributes to the pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeSize {
    /// The type only fixes the size of one component, in bits.
    Component(u32),
    /// The type fixes the size of the whole pixel, in bits.
    Pixel(u32),
}

fn type_size(ty: u32) -> Option<TypeSize> {
    use gl_enum::*;

    match ty {
        BYTE | UNSIGNED_BYTE => Some(TypeSize::Component(8)),
        SHORT
        | UNSIGNED_SHORT
        | UNSIGNED_SHORT_5_6_5
        | UNSIGNED_SHORT_4_4_4_4
        | UNSIGNED_SHORT_5_5_5_1
        | RGB565_OES
        | RGB5_A1_OES
        | RGBA4_OES => Some(TypeSize::Pixel(16)),
        INT | UNSIGNED_INT | FLOAT | FIXED | UNSIGNED_INT_24_8_OES => Some(TypeSize::Pixel(32)),
        _ => None,
    }
}

/// Number of channels stored per pixel for a GL pixel format, or `None`
/// when the format is not recognized.
pub fn channel_count(format: u32) -> Option<u32> {
    use gl_enum::*;

    match format {
        ALPHA | LUMINANCE | DEPTH_COMPONENT | DEPTH_STENCIL_OES => Some(1),
        LUMINANCE_ALPHA => Some(2),
        RGB => Some(3),
        RGBA | BGRA_EXT => Some(4),
        _ => None,
    }
}

/// Size of one pixel in bits for the given format/type pair.
///
/// The type is consulted first: packed and wide types fix the pixel size on
/// their own, byte types only fix the component size, which is then scaled
/// by the format's channel count. Returns 0 for unknown pairs.
pub fn bits_per_pixel(format: u32, ty: u32) -> u32 {
    let component_bits = match type_size(ty) {
        Some(TypeSize::Pixel(bits)) => return bits,
        Some(TypeSize::Component(bits)) => bits,
        None => {
            log::warn!("bits_per_pixel: unknown pixel type {ty:#06x}, assuming pixel size 0");
            0
        }
    };

    match channel_count(format) {
        Some(channels) => channels * component_bits,
        None => {
            log::warn!("bits_per_pixel: unknown pixel format {format:#06x}");
            0
        }
    }
}

/// Rounds `line` up to the next multiple of [`ROW_ALIGNMENT`].
pub fn align_row(line: usize) -> usize {
    line.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT
}

/// Byte length of one image row, padded to [`ROW_ALIGNMENT`].
///
/// Returns 0 if the width is 0 or the pixel size is unknown.
pub fn row_stride(width: u32, format: u32, ty: u32) -> usize {
    let bytes_per_pixel = (bits_per_pixel(format, ty) / 8) as usize;
    align_row(bytes_per_pixel * width as usize)
}

/// Total byte size of a `width` x `height` image whose rows are padded to
/// [`ROW_ALIGNMENT`].
///
/// Zero width or height yields 0. An unknown format/type pair also yields 0
/// after logging the request.
pub fn row_aligned_size(width: u32, height: u32, format: u32, ty: u32) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }

    let stride = row_stride(width, format, ty);
    if stride == 0 {
        log::warn!(
            "unknown pixel size: width: {width} height: {height} format: {format:#06x} type: {ty:#06x}"
        );
    }
    stride * height as usize
}

/// Storage of the render target's color texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// 8 bits per channel, no alpha.
    #[default]
    Rgb8,
    /// 8 bits per channel with alpha.
    Rgba8,
}

impl TargetFormat {
    /// GL format (also used as the unsized internal format on ES 2).
    pub fn gl_format(self) -> u32 {
        match self {
            TargetFormat::Rgb8 => gl_enum::RGB,
            TargetFormat::Rgba8 => gl_enum::RGBA,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, TargetFormat::Rgba8)
    }

    /// Bytes per texel of the target's storage.
    pub fn bytes_per_texel(self) -> usize {
        (bits_per_pixel(self.gl_format(), gl_enum::UNSIGNED_BYTE) / 8) as usize
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgb8" => Ok(TargetFormat::Rgb8),
            "rgba8" => Ok(TargetFormat::Rgba8),
            _ => Err(format!("unknown target format '{s}' (expected rgb8 or rgba8)")),
        }
    }
}

/// Byte layout of a host-side image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferLayout {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: usize,
    pub stride: usize,
    pub size: usize,
}

impl BufferLayout {
    /// Computes the layout for the given image, or `None` when nothing can
    /// be allocated (zero dimension or unknown format/type).
    pub fn new(width: u32, height: u32, format: u32, ty: u32) -> Option<Self> {
        let size = row_aligned_size(width, height, format, ty);
        if size == 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            bytes_per_pixel: (bits_per_pixel(format, ty) / 8) as usize,
            stride: row_stride(width, format, ty),
            size,
        })
    }

    /// Layout of an RGBA / unsigned-byte readback.
    pub fn rgba8(width: u32, height: u32) -> Option<Self> {
        Self::new(width, height, gl_enum::RGBA, gl_enum::UNSIGNED_BYTE)
    }

    /// Bytes of pixel data per row, without the alignment padding.
    pub fn packed_row(&self) -> usize {
        self.bytes_per_pixel * self.width as usize
    }
}
