//! Render target (FBO + texture) for offscreen rendering.
//!
//! A `RenderTarget` pairs a framebuffer object with a single 2D color
//! texture the size of the session's pbuffer. Every draw and every readback
//! goes through it rather than the pbuffer's default framebuffer.

use super::check;
use super::texture::{create_texture, TextureConfig};
use crate::error::RenderError;
use crate::pixel::TargetFormat;

/// A framebuffer object and its attached color texture.
#[derive(Debug)]
pub struct RenderTarget {
    fbo: glow::Framebuffer,
    texture: glow::Texture,
    width: u32,
    height: u32,
    format: TargetFormat,
}

impl RenderTarget {
    /// Creates a framebuffer with a new `format` texture at
    /// `COLOR_ATTACHMENT0`, verifies completeness, and rebinds the default
    /// framebuffer.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDimensions` for a zero size,
    /// `RenderError::Create`/`Gl` if an object cannot be allocated, or
    /// `RenderError::IncompleteFramebuffer`. Nothing is left allocated on
    /// any error path.
    #[allow(unsafe_code)]
    pub fn new(
        gl: &glow::Context,
        width: u32,
        height: u32,
        format: TargetFormat,
    ) -> Result<Self, RenderError> {
        use glow::HasContext;

        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }

        let config = TextureConfig::target(format, width, height);
        let texture = create_texture(gl, &config, None)?;

        // SAFETY: glow wraps raw GL calls as unsafe. We create, configure,
        // and verify a framebuffer using the texture created above.
        let fbo = match unsafe { gl.create_framebuffer() } {
            Ok(fbo) => fbo,
            Err(message) => {
                // SAFETY: the texture was created above and is not attached.
                unsafe { gl.delete_texture(texture) };
                return Err(RenderError::Create {
                    object: "framebuffer",
                    message,
                });
            }
        };

        // SAFETY: binds the new framebuffer, attaches the texture, and
        // restores the default framebuffer before returning the status.
        let status = unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            status
        };

        let attached = if status == glow::FRAMEBUFFER_COMPLETE {
            check::gl_error(gl, "glFramebufferTexture2D")
        } else {
            Err(RenderError::IncompleteFramebuffer(status))
        };
        if let Err(e) = attached {
            // SAFETY: both objects were created above and nothing else holds
            // them; the framebuffer is no longer bound.
            unsafe {
                gl.delete_texture(texture);
                gl.delete_framebuffer(fbo);
            }
            return Err(e);
        }

        log::debug!("render target {width}x{height} {format:?} ready");

        Ok(Self {
            fbo,
            texture,
            width,
            height,
            format,
        })
    }

    /// Binds this target's framebuffer and sets the viewport to its size.
    #[allow(unsafe_code)]
    pub fn bind(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: self.fbo is a valid framebuffer handle created in new().
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.viewport(0, 0, self.width as i32, self.height as i32);
        }
    }

    /// Rebinds the default framebuffer.
    #[allow(unsafe_code)]
    pub fn unbind(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: binding framebuffer 0 is always valid.
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
    }

    pub fn texture(&self) -> glow::Texture {
        self.texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// Deletes the texture, then the framebuffer.
    #[allow(unsafe_code)]
    pub fn destroy(self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: both handles are valid and `self` is consumed.
        unsafe {
            gl.delete_texture(self.texture);
            gl.delete_framebuffer(self.fbo);
        }
    }
}
