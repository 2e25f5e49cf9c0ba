#![deny(unsafe_code)]
//! Core types for offscreen-gl: offscreen EGL pbuffer rendering with readback.
//!
//! Provides the pixel/stride math (`pixel`), the host-side `PixelBuffer`,
//! `ClearColor`, the built-in `SceneKind`s and their shader sources, session
//! planning with the staggered two-worker runner (`session`), and the error
//! taxonomy. The EGL + OpenGL ES pipeline lives in [`render`] behind the
//! `render` feature.

pub mod buffer;
pub mod color;
pub mod error;
pub mod pixel;
pub mod scene;
pub mod session;

#[cfg(feature = "render")]
pub mod render;

pub use buffer::PixelBuffer;
pub use color::ClearColor;
pub use error::{ContextState, DriverFault, Phase, RenderError, ShaderError, Stage};
pub use pixel::{bits_per_pixel, row_aligned_size, row_stride, BufferLayout, TargetFormat};
pub use scene::SceneKind;
pub use session::{CancelToken, FrameSink, PassLimit, SessionPlan, SessionReport};
