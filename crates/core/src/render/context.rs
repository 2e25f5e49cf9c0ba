//! One offscreen rendering session's EGL surface, context and GL objects.
//!
//! `OffscreenContext` walks the lifecycle
//! `Uninitialized → SurfaceCreated → ContextCreated → Current → Destroyed`.
//! Setup steps return `Err` and leave the session to give up; draw, readback
//! and teardown problems are logged and kept as [`DriverFault`]s instead.
//! The context is `!Send`: once current on a thread it stays there.

use super::check::{self, egl_at};
use super::display::{pbuffer_attribs, DisplayConnection, SurfaceConfig};
use super::scene::Scene;
use super::target::RenderTarget;
use crate::buffer::PixelBuffer;
use crate::color::ClearColor;
use crate::error::{ContextState, DriverFault, Phase, RenderError};
use crate::pixel::{gl_enum, BufferLayout, TargetFormat, ROW_ALIGNMENT};
use crate::scene::SceneKind;
use khronos_egl as egl;
use serde::Serialize;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

/// Driver identification strings of a current GL context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    /// `IMPLEMENTATION_COLOR_READ_FORMAT` of the bound framebuffer.
    pub read_format: u32,
    /// `IMPLEMENTATION_COLOR_READ_TYPE` of the bound framebuffer.
    pub read_type: u32,
}

/// A pbuffer surface, its rendering context, and the GL objects drawn with
/// it, all borrowed against one display connection.
pub struct OffscreenContext<'d> {
    display: &'d DisplayConnection,
    config: &'d SurfaceConfig,
    width: u32,
    height: u32,
    state: ContextState,
    surface: Option<egl::Surface>,
    context: Option<egl::Context>,
    owner: Option<ThreadId>,
    gl: Option<glow::Context>,
    target: Option<RenderTarget>,
    scene: Option<Scene>,
    faults: Vec<DriverFault>,
    _not_send: PhantomData<*mut ()>,
}

impl<'d> OffscreenContext<'d> {
    /// Prepares a session of `width` x `height` pixels. No driver call is
    /// made until [`create_surface`](Self::create_surface).
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDimensions` for a zero size or one that
    /// does not fit an EGL integer.
    pub fn new(
        display: &'d DisplayConnection,
        config: &'d SurfaceConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let fits = |v: u32| v > 0 && i32::try_from(v).is_ok();
        if !fits(width) || !fits(height) {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            display,
            config,
            width,
            height,
            state: ContextState::Uninitialized,
            surface: None,
            context: None,
            owner: None,
            gl: None,
            target: None,
            scene: None,
            faults: Vec::new(),
            _not_send: PhantomData,
        })
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Faults recorded so far.
    pub fn faults(&self) -> &[DriverFault] {
        &self.faults
    }

    /// Removes and returns the faults recorded so far.
    pub fn take_faults(&mut self) -> Vec<DriverFault> {
        std::mem::take(&mut self.faults)
    }

    /// Logs `err` and keeps it as a fault of `phase`.
    pub fn record(&mut self, phase: Phase, label: &str, err: &RenderError) {
        record(&mut self.faults, phase, label, err);
    }

    /// Creates the pbuffer surface.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState` out of order, or
    /// `RenderError::Egl` from `eglCreatePbufferSurface`.
    pub fn create_surface(&mut self) -> Result<(), RenderError> {
        let next = self.state.advance(ContextState::SurfaceCreated)?;
        let attribs = pbuffer_attribs(self.width as i32, self.height as i32);
        let surface = self
            .display
            .egl()
            .create_pbuffer_surface(self.display.raw(), self.config.raw(), &attribs)
            .map_err(egl_at("eglCreatePbufferSurface"))?;
        self.surface = Some(surface);
        self.state = next;
        Ok(())
    }

    /// Creates the rendering context, optionally sharing objects with
    /// another session's context.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState` out of order, or
    /// `RenderError::Egl` from `eglBindAPI` or `eglCreateContext`.
    pub fn create_context(
        &mut self,
        share_with: Option<&OffscreenContext<'_>>,
    ) -> Result<(), RenderError> {
        let next = self.state.advance(ContextState::ContextCreated)?;
        let share = share_with.and_then(|other| other.context);
        let egl = self.display.egl();
        // The bound API is per-thread state.
        egl.bind_api(egl::OPENGL_ES_API)
            .map_err(egl_at("eglBindAPI"))?;
        let context = egl
            .create_context(
                self.display.raw(),
                self.config.raw(),
                share,
                &self.config.context_attribs(),
            )
            .map_err(egl_at("eglCreateContext"))?;
        self.context = Some(context);
        self.state = next;
        Ok(())
    }

    /// Binds the context and surface to the calling thread and loads the GL
    /// entry points.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState` out of order, or
    /// `RenderError::Egl` from `eglMakeCurrent`.
    #[allow(unsafe_code)]
    pub fn make_current(&mut self) -> Result<(), RenderError> {
        let next = self.state.advance(ContextState::Current)?;
        let egl = self.display.egl();
        egl.make_current(self.display.raw(), self.surface, self.surface, self.context)
            .map_err(egl_at("eglMakeCurrent"))?;

        // SAFETY: the context was just made current on this thread, and the
        // loader returns either a valid entry point or null.
        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                egl.get_proc_address(name)
                    .map_or(std::ptr::null(), |f| f as *const c_void)
            })
        };
        self.gl = Some(gl);
        self.owner = Some(thread::current().id());
        self.state = next;

        log::info!(
            "{:?} display {:p} context {:p} surface {:p}",
            thread::current().id(),
            self.display.raw().as_ptr(),
            self.context.map_or(std::ptr::null_mut(), |c| c.as_ptr()),
            self.surface.map_or(std::ptr::null_mut(), |s| s.as_ptr()),
        );
        let info = self.gl_info()?;
        log::info!(
            "GL vendor '{}' renderer '{}' version '{}'",
            info.vendor,
            info.renderer,
            info.version
        );
        log::info!(
            "support color format {:#06x} type {:#06x}",
            info.read_format,
            info.read_type
        );
        Ok(())
    }

    /// Returns the GL context if it is the one bound to the calling thread.
    fn current_gl(&self) -> Result<&glow::Context, RenderError> {
        if self.state != ContextState::Current {
            return Err(RenderError::InvalidState {
                expected: ContextState::Current,
                found: self.state,
            });
        }
        if self.owner != Some(thread::current().id()) {
            return Err(RenderError::NotCurrent);
        }
        let bound = self.display.egl().get_current_context().map(|c| c.as_ptr());
        if bound != self.context.map(|c| c.as_ptr()) {
            return Err(RenderError::NotCurrent);
        }
        self.gl.as_ref().ok_or(RenderError::NotCurrent)
    }

    /// Runs `f` with the GL context.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState`/`NotCurrent` unless current on
    /// this thread.
    pub fn with_gl<R>(&self, f: impl FnOnce(&glow::Context) -> R) -> Result<R, RenderError> {
        self.current_gl().map(f)
    }

    /// Queries the driver identification strings and native read format.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState`/`NotCurrent` unless current on
    /// this thread.
    #[allow(unsafe_code)]
    pub fn gl_info(&self) -> Result<GlInfo, RenderError> {
        use glow::HasContext;

        let gl = self.current_gl()?;
        // SAFETY: glGetString/glGetIntegerv only read state.
        unsafe {
            Ok(GlInfo {
                vendor: gl.get_parameter_string(glow::VENDOR),
                renderer: gl.get_parameter_string(glow::RENDERER),
                version: gl.get_parameter_string(glow::VERSION),
                read_format: gl.get_parameter_i32(glow::IMPLEMENTATION_COLOR_READ_FORMAT) as u32,
                read_type: gl.get_parameter_i32(glow::IMPLEMENTATION_COLOR_READ_TYPE) as u32,
            })
        }
    }

    /// Creates the render target every pass draws into and reads from.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState`/`NotCurrent` unless current on
    /// this thread, or any error from [`RenderTarget::new`].
    pub fn attach_target(&mut self, format: TargetFormat) -> Result<(), RenderError> {
        let target = RenderTarget::new(self.current_gl()?, self.width, self.height, format)?;
        if let Some(old) = self.target.replace(target) {
            old.destroy(self.current_gl()?);
        }
        Ok(())
    }

    /// Builds the GPU resources for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState`/`NotCurrent` unless current on
    /// this thread, or any error from [`Scene::new`].
    pub fn install_scene(&mut self, kind: SceneKind) -> Result<(), RenderError> {
        let scene = Scene::new(self.current_gl()?, kind)?;
        if let Some(mut old) = self.scene.replace(scene) {
            old.destroy(self.current_gl()?);
        }
        Ok(())
    }

    /// Clears the render target to `clear` and draws the installed scene.
    ///
    /// Driver errors are recorded as steady-state faults, not returned.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState`/`NotCurrent` unless current on
    /// this thread, or `RenderError::InvalidState` if no target is attached.
    #[allow(unsafe_code)]
    pub fn draw_pass(&mut self, clear: ClearColor) -> Result<(), RenderError> {
        use glow::HasContext;

        let gl = self.current_gl()?;
        let target = self.target.as_ref().ok_or(RenderError::InvalidState {
            expected: ContextState::Current,
            found: self.state,
        })?;

        target.bind(gl);
        let bound = check::gl_error(gl, "glBindFramebuffer");
        // SAFETY: clearing the bound, complete framebuffer.
        unsafe {
            gl.clear_color(clear.r, clear.g, clear.b, clear.a);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
        let cleared = check::gl_error(gl, "glClear");
        let drawn = match &self.scene {
            Some(scene) => scene.draw(gl),
            None => Ok(()),
        };
        target.unbind(gl);

        for (label, result) in [
            ("glBindFramebuffer", bound),
            ("glClear", cleared),
            ("draw", drawn),
        ] {
            if let Err(e) = result {
                record(&mut self.faults, Phase::Steady, label, &e);
            }
        }
        Ok(())
    }

    /// Reads the render target back as RGBA8 with 4-byte row alignment.
    ///
    /// A GL error from the read is recorded as a fault and the (possibly
    /// stale) buffer is still returned.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState`/`NotCurrent` unless current on
    /// this thread or with no target attached, or
    /// `RenderError::UnsupportedPixelFormat` if no buffer can be sized for
    /// the read.
    #[allow(unsafe_code)]
    pub fn read_back(&mut self) -> Result<PixelBuffer, RenderError> {
        use glow::HasContext;

        let gl = self.current_gl()?;
        let target = self.target.as_ref().ok_or(RenderError::InvalidState {
            expected: ContextState::Current,
            found: self.state,
        })?;

        let layout = BufferLayout::new(
            self.width,
            self.height,
            gl_enum::RGBA,
            gl_enum::UNSIGNED_BYTE,
        )
        .filter(|l| l.size > 0)
        .ok_or(RenderError::UnsupportedPixelFormat {
            format: gl_enum::RGBA,
            ty: gl_enum::UNSIGNED_BYTE,
        })?;
        let mut frame = PixelBuffer::rgba8(layout.width, layout.height)?;

        // SAFETY: pixel store parameters only.
        unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, ROW_ALIGNMENT as i32);
        }
        let stored = check::gl_error(gl, "glPixelStorei");

        target.bind(gl);
        // SAFETY: the destination holds `stride * height` bytes and
        // PACK_ALIGNMENT matches the stride's alignment.
        unsafe {
            gl.read_pixels(
                0,
                0,
                self.width as i32,
                self.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(frame.as_bytes_mut())),
            );
        }
        let read = check::gl_error(gl, "glReadPixels");
        target.unbind(gl);

        for (label, result) in [("glPixelStorei", stored), ("glReadPixels", read)] {
            if let Err(e) = result {
                record(&mut self.faults, Phase::Steady, label, &e);
            }
        }
        Ok(frame)
    }

    /// Releases everything in order: scene and target objects, the thread
    /// binding, the surface, then the context.
    ///
    /// Every step is attempted even if an earlier one fails; failures are
    /// recorded as teardown faults. Calling it again is a no-op.
    pub fn teardown(&mut self) {
        if self.state == ContextState::Destroyed {
            return;
        }

        let egl = self.display.egl();
        let display = self.display.raw();

        let on_owner = self.owner == Some(thread::current().id());
        let bound_here = on_owner
            && egl.get_current_context().map(|c| c.as_ptr()) == self.context.map(|c| c.as_ptr());

        if let Some(gl) = self.gl.as_ref().filter(|_| bound_here) {
            if let Some(mut scene) = self.scene.take() {
                scene.destroy(gl);
            }
            if let Some(target) = self.target.take() {
                target.destroy(gl);
            }
            if let Err(e) = check::gl_error(gl, "delete GL objects") {
                record(&mut self.faults, Phase::Teardown, "delete GL objects", &e);
            }
        } else if self.scene.is_some() || self.target.is_some() {
            let err = RenderError::NotCurrent;
            record(&mut self.faults, Phase::Teardown, "delete GL objects", &err);
            self.scene = None;
            self.target = None;
        }
        self.gl = None;
        self.owner = None;

        if bound_here {
            if let Err(e) = egl.make_current(display, None, None, None) {
                let e = check::egl_error("eglMakeCurrent(release)", e);
                record(&mut self.faults, Phase::Teardown, "eglMakeCurrent", &e);
            }
        }
        if let Some(surface) = self.surface.take() {
            if let Err(e) = egl.destroy_surface(display, surface) {
                let e = check::egl_error("eglDestroySurface", e);
                record(&mut self.faults, Phase::Teardown, "eglDestroySurface", &e);
            }
        }
        if let Some(context) = self.context.take() {
            if let Err(e) = egl.destroy_context(display, context) {
                let e = check::egl_error("eglDestroyContext", e);
                record(&mut self.faults, Phase::Teardown, "eglDestroyContext", &e);
            }
        }

        self.state = ContextState::Destroyed;
        log::debug!("{:?} session torn down", thread::current().id());
    }
}

impl Drop for OffscreenContext<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn record(faults: &mut Vec<DriverFault>, phase: Phase, label: &str, err: &RenderError) {
    let fault = DriverFault::from_error(phase, label, err);
    match phase {
        Phase::Teardown => log::error!("{fault}"),
        _ => log::warn!("{fault}"),
    }
    faults.push(fault);
}
