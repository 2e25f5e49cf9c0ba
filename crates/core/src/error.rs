//! Error types for offscreen-gl.
//!
//! Failures come in two tiers. Setup failures (display init, config
//! selection, surface/context creation, activation, shader build) are
//! returned as [`RenderError`] and end the session that hit them. Failures
//! during steady-state drawing and teardown are logged and recorded as
//! [`DriverFault`]s so the session can keep going.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Shader stage kind, used to label compile failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors that can occur during shader compilation or program linking.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    /// A shader stage failed to compile.
    #[error("shader compile error ({stage}):\n{log}")]
    Compile {
        /// The stage that failed.
        stage: Stage,
        /// The driver's info log, prefixed with the numbered source.
        log: String,
    },
    /// A program failed to link.
    #[error("shader link error:\n{0}")]
    Link(String),
    /// A required vertex attribute is not active in the linked program.
    #[error("attribute '{0}' not found in linked program")]
    MissingAttribute(String),
}

/// Lifecycle state of an offscreen context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextState {
    Uninitialized,
    SurfaceCreated,
    ContextCreated,
    Current,
    Destroyed,
}

impl ContextState {
    /// State that must hold before moving to `self`, or `None` for the
    /// initial state and for `Destroyed`, which is reachable from anywhere.
    pub fn predecessor(self) -> Option<ContextState> {
        match self {
            ContextState::Uninitialized | ContextState::Destroyed => None,
            ContextState::SurfaceCreated => Some(ContextState::Uninitialized),
            ContextState::ContextCreated => Some(ContextState::SurfaceCreated),
            ContextState::Current => Some(ContextState::ContextCreated),
        }
    }

    /// Moves to `next` if `self` is its predecessor.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidState` naming the state `next` requires.
    pub fn advance(self, next: ContextState) -> Result<ContextState, RenderError> {
        match next.predecessor() {
            Some(expected) if expected != self => Err(RenderError::InvalidState {
                expected,
                found: self,
            }),
            None if next == ContextState::Uninitialized => Err(RenderError::InvalidState {
                expected: ContextState::Destroyed,
                found: self,
            }),
            _ => Ok(next),
        }
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextState::Uninitialized => "uninitialized",
            ContextState::SurfaceCreated => "surface-created",
            ContextState::ContextCreated => "context-created",
            ContextState::Current => "current",
            ContextState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Errors produced by the offscreen pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The EGL library could not be loaded.
    #[error("failed to load EGL: {0}")]
    Load(String),

    /// An EGL call failed.
    #[error("EGL error {code:#06x} at {label}: {message}")]
    Egl {
        label: String,
        code: i32,
        message: String,
    },

    /// `glGetError` reported an error after a GL call.
    #[error("OpenGL error {code:#06x} ({}) at {label}", gl_error_name(*.code))]
    Gl { label: String, code: u32 },

    /// The driver refused to allocate an object.
    #[error("failed to create {object}: {message}")]
    Create {
        object: &'static str,
        message: String,
    },

    /// No EGL config matched the requested attributes.
    #[error("no EGL config matches the requested attributes ({0} configs available)")]
    NoConfig(usize),

    /// Building a shader program failed.
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// Width or height was zero or does not fit the driver's integer type.
    #[error("invalid dimensions {width}x{height}: width and height must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The pixel format/type pair has no known size.
    #[error("unsupported pixel format {format:#06x} / type {ty:#06x}")]
    UnsupportedPixelFormat { format: u32, ty: u32 },

    /// An operation was issued in the wrong lifecycle state.
    #[error("invalid context state: expected {expected}, found {found}")]
    InvalidState {
        expected: ContextState,
        found: ContextState,
    },

    /// A call that needs the context current came from another thread.
    #[error("context is not current on this thread")]
    NotCurrent,

    /// The framebuffer was not complete after attaching its texture.
    #[error("framebuffer incomplete: status {0:#06x}")]
    IncompleteFramebuffer(u32),

    /// A session worker panicked before returning.
    #[error("session '{session}' panicked: {message}")]
    WorkerPanicked { session: String, message: String },

    /// Writing an output image failed.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Phase in which a driver fault was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Steady,
    Teardown,
}

/// A non-fatal driver problem, reported and then stepped over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverFault {
    pub phase: Phase,
    pub label: String,
    pub code: i64,
    pub message: String,
}

impl DriverFault {
    /// Builds a fault from an error, keeping its code when it has one.
    pub fn from_error(phase: Phase, label: &str, err: &RenderError) -> Self {
        let code = match err {
            RenderError::Egl { code, .. } => i64::from(*code),
            RenderError::Gl { code, .. } => i64::from(*code),
            _ => 0,
        };
        Self {
            phase,
            label: label.to_string(),
            code,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for DriverFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {:#06x} at {}: {}",
            self.phase, self.code, self.label, self.message
        )
    }
}

/// Symbolic name for a `glGetError` code.
pub fn gl_error_name(code: u32) -> &'static str {
    match code {
        0 => "GL_NO_ERROR",
        0x0500 => "GL_INVALID_ENUM",
        0x0501 => "GL_INVALID_VALUE",
        0x0502 => "GL_INVALID_OPERATION",
        0x0505 => "GL_OUT_OF_MEMORY",
        0x0506 => "GL_INVALID_FRAMEBUFFER_OPERATION",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display_includes_stage_and_log() {
        let err = ShaderError::Compile {
            stage: Stage::Fragment,
            log: "undeclared identifier".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("fragment"), "missing stage in: {msg}");
        assert!(msg.contains("undeclared identifier"), "missing log in: {msg}");
    }

    #[test]
    fn link_error_display_includes_log() {
        let err = ShaderError::Link("varying mismatch".into());
        assert!(err.to_string().contains("varying mismatch"));
    }

    #[test]
    fn gl_error_display_includes_code_name_and_label() {
        let err = RenderError::Gl {
            label: "glReadPixels".into(),
            code: 0x0502,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x0502"), "missing code in: {msg}");
        assert!(msg.contains("GL_INVALID_OPERATION"), "missing name in: {msg}");
        assert!(msg.contains("glReadPixels"), "missing label in: {msg}");
    }

    #[test]
    fn egl_error_display_includes_label() {
        let err = RenderError::Egl {
            label: "eglCreatePbufferSurface".into(),
            code: 0x3009,
            message: "bad match".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x3009"), "missing code in: {msg}");
        assert!(msg.contains("eglCreatePbufferSurface"), "missing label in: {msg}");
    }

    #[test]
    fn shader_error_converts_into_render_error() {
        let err: RenderError = ShaderError::Link("boom".into()).into();
        assert!(matches!(err, RenderError::Shader(ShaderError::Link(_))));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn invalid_state_names_both_states() {
        let err = RenderError::InvalidState {
            expected: ContextState::Current,
            found: ContextState::SurfaceCreated,
        };
        let msg = err.to_string();
        assert!(msg.contains("current"), "got: {msg}");
        assert!(msg.contains("surface-created"), "got: {msg}");
    }

    #[test]
    fn states_advance_in_order() {
        let mut state = ContextState::Uninitialized;
        for next in [
            ContextState::SurfaceCreated,
            ContextState::ContextCreated,
            ContextState::Current,
            ContextState::Destroyed,
        ] {
            state = state.advance(next).unwrap();
        }
        assert_eq!(state, ContextState::Destroyed);
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let err = ContextState::Uninitialized
            .advance(ContextState::ContextCreated)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidState {
                expected: ContextState::SurfaceCreated,
                found: ContextState::Uninitialized,
            }
        ));
        assert!(ContextState::Current.advance(ContextState::Current).is_err());
        assert!(ContextState::Current.advance(ContextState::Uninitialized).is_err());
    }

    #[test]
    fn destroyed_is_reachable_from_any_state() {
        assert!(ContextState::SurfaceCreated
            .advance(ContextState::Destroyed)
            .is_ok());
        assert!(ContextState::Uninitialized
            .advance(ContextState::Destroyed)
            .is_ok());
    }

    #[test]
    fn fault_keeps_gl_code() {
        let err = RenderError::Gl {
            label: "glDrawArrays".into(),
            code: 0x0506,
        };
        let fault = DriverFault::from_error(Phase::Steady, "glDrawArrays", &err);
        assert_eq!(fault.code, 0x0506);
        assert_eq!(fault.phase, Phase::Steady);
        assert!(fault.to_string().contains("glDrawArrays"));
    }

    #[test]
    fn fault_without_driver_code_uses_zero() {
        let err = RenderError::Io("disk full".into());
        let fault = DriverFault::from_error(Phase::Steady, "write png", &err);
        assert_eq!(fault.code, 0);
        assert!(fault.message.contains("disk full"));
    }

    #[test]
    fn unknown_gl_error_name() {
        assert_eq!(gl_error_name(0x1234), "unknown");
        assert_eq!(gl_error_name(0x0505), "GL_OUT_OF_MEMORY");
    }

    #[test]
    fn render_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RenderError>();
    }

    #[test]
    fn render_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<RenderError>();
        assert_std_error::<ShaderError>();
    }
}
