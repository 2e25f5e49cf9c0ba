//! Texture creation helpers for OpenGL ES.
//!
//! Render target textures and the sampled scene texture both go through
//! [`create_texture`]: NEAREST filtering, CLAMP_TO_EDGE on both axes, no
//! mipmaps, unsigned-byte texels.

use super::check;
use crate::error::RenderError;
use crate::pixel::TargetFormat;
use crate::scene::{SAMPLE_TEXELS, SAMPLE_TEXTURE_SIZE};

/// Configuration for creating a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureConfig {
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// GL format, used as both internal and upload format (unsized, so it
    /// is valid under ES 2.0).
    pub format: u32,
    /// GL filter for both min and mag.
    pub filter: u32,
}

impl TextureConfig {
    /// Color attachment for a render target of the given format.
    pub fn target(format: TargetFormat, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: format.gl_format(),
            filter: glow::NEAREST,
        }
    }

    /// The 2x2 RGB texture sampled by the textured quad.
    pub fn sample() -> Self {
        Self {
            width: SAMPLE_TEXTURE_SIZE,
            height: SAMPLE_TEXTURE_SIZE,
            format: glow::RGB,
            filter: glow::NEAREST,
        }
    }
}

/// Creates a 2D texture from `config`, optionally filled with `texels`.
///
/// Leaves `TEXTURE_2D` unbound on the active unit.
///
/// # Errors
///
/// Returns `RenderError::Create` if the driver cannot allocate a texture,
/// or `RenderError::Gl` if allocating storage fails. The texture is deleted
/// on the error path.
#[allow(unsafe_code)]
pub fn create_texture(
    gl: &glow::Context,
    config: &TextureConfig,
    texels: Option<&[u8]>,
) -> Result<glow::Texture, RenderError> {
    use glow::HasContext;

    // SAFETY: glow wraps raw GL calls as unsafe. We create, configure,
    // and allocate a texture using valid parameters from TextureConfig.
    let texture = unsafe {
        gl.create_texture().map_err(|message| RenderError::Create {
            object: "texture",
            message,
        })?
    };

    let allocated = unsafe {
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            config.format as i32,
            config.width as i32,
            config.height as i32,
            0,
            config.format,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(texels),
        );
        check::gl_error(gl, "glTexImage2D")
    };

    unsafe {
        for (pname, value) in [
            (glow::TEXTURE_MIN_FILTER, config.filter),
            (glow::TEXTURE_MAG_FILTER, config.filter),
            (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
            (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
        ] {
            gl.tex_parameter_i32(glow::TEXTURE_2D, pname, value as i32);
        }
        gl.bind_texture(glow::TEXTURE_2D, None);
    }

    if let Err(e) = allocated.and_then(|()| check::gl_error(gl, "glTexParameteri")) {
        unsafe { gl.delete_texture(texture) };
        return Err(e);
    }

    Ok(texture)
}

/// Uploads the textured quad's sample texels with unpack alignment 1.
///
/// # Errors
///
/// See [`create_texture`].
#[allow(unsafe_code)]
pub fn create_sample_texture(gl: &glow::Context) -> Result<glow::Texture, RenderError> {
    use glow::HasContext;

    // SAFETY: setting pixel store state has no preconditions. Rows of the
    // 2x2 RGB image are 6 bytes, so they must be read tightly packed.
    unsafe { gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1) };
    create_texture(gl, &TextureConfig::sample(), Some(&SAMPLE_TEXELS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_config_follows_format() {
        let rgb = TextureConfig::target(TargetFormat::Rgb8, 512, 256);
        assert_eq!((rgb.width, rgb.height), (512, 256));
        assert_eq!(rgb.format, glow::RGB);
        assert_eq!(rgb.filter, glow::NEAREST);

        let rgba = TextureConfig::target(TargetFormat::Rgba8, 4, 4);
        assert_eq!(rgba.format, glow::RGBA);
    }

    #[test]
    fn sample_config_matches_texels() {
        let config = TextureConfig::sample();
        assert_eq!(config.format, glow::RGB);
        assert_eq!(
            (config.width * config.height * 3) as usize,
            SAMPLE_TEXELS.len()
        );
    }

    #[test]
    fn texture_config_debug_format_is_readable() {
        let config = TextureConfig::target(TargetFormat::Rgb8, 100, 200);
        let debug = format!("{config:?}");
        assert!(debug.contains("100"), "missing width in debug: {debug}");
        assert!(debug.contains("200"), "missing height in debug: {debug}");
    }
}
