//! EGL pbuffer + OpenGL ES rendering infrastructure.
//!
//! This module is only available when the `render` feature is enabled.
//! It loads EGL at runtime, so building it needs no system GL headers.
//!
//! # Module overview
//!
//! - [`display`] -- Display connection and shared surface config.
//! - [`check`] -- GL/EGL error checks labelled with the call site.
//! - [`shader`] -- Shader compilation, linking, and error formatting.
//! - [`texture`] -- Texture configuration and creation helpers.
//! - [`target`] -- FBO + texture render targets.
//! - [`scene`] -- GPU resources for a built-in scene.
//! - [`context`] -- Per-session surface/context lifecycle, draw and readback.
//! - [`coordinator`] -- Single and two-thread session drivers.

pub mod check;
pub mod context;
pub mod coordinator;
pub mod display;
pub mod scene;
pub mod shader;
pub mod target;
pub mod texture;

pub use context::{GlInfo, OffscreenContext};
pub use coordinator::{run_concurrent, run_session, run_single};
pub use display::{DisplayConnection, DisplayInfo, DisplayOptions, SurfaceConfig};
pub use scene::Scene;
pub use shader::{compile_stage, format_shader_error, link_program, Program};
pub use target::RenderTarget;
pub use texture::{create_texture, TextureConfig};
