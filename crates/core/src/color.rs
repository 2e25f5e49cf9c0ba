//! Clear color and its RGBA8 readback value.

use serde::{Deserialize, Serialize};

/// Color the render target is cleared to before each pass, in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColor {
    /// Transparent black, the GL default clear color.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Converts to RGBA8 the way a fixed-point color buffer stores it.
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            unorm8(self.r),
            unorm8(self.g),
            unorm8(self.b),
            unorm8(self.a),
        ]
    }

    /// Value a readback is expected to return after clearing, for a target
    /// that does or does not store alpha. Targets without alpha read back
    /// as fully opaque.
    pub fn expected_readback(self, has_alpha: bool) -> [u8; 4] {
        let mut rgba = self.to_rgba8();
        if !has_alpha {
            rgba[3] = u8::MAX;
        }
        rgba
    }
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

/// Float to 8-bit unorm, rounding halfway cases to even as Mesa does.
fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round_ties_even() as u8
}
