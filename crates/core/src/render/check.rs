//! `glGetError` / EGL error checks, labelled with the call site.

use crate::error::RenderError;

/// Returns the pending GL error after `label`, if any.
///
/// Only the first pending error is reported; any further queued errors are
/// drained and logged so the next check starts clean.
///
/// # Errors
///
/// Returns `RenderError::Gl` carrying the error code and `label`.
#[allow(unsafe_code)]
pub fn gl_error(gl: &glow::Context, label: &str) -> Result<(), RenderError> {
    use glow::HasContext;

    // SAFETY: glGetError has no preconditions beyond a current context.
    let code = unsafe { gl.get_error() };
    if code == glow::NO_ERROR {
        return Ok(());
    }

    let mut extra = 0;
    // SAFETY: as above.
    while unsafe { gl.get_error() } != glow::NO_ERROR {
        extra += 1;
        if extra >= 16 {
            break;
        }
    }
    if extra > 0 {
        log::debug!("{label}: {extra} more GL errors were queued");
    }

    Err(RenderError::Gl {
        label: label.to_string(),
        code,
    })
}

/// Converts an EGL failure into a labelled `RenderError::Egl`.
pub fn egl_error(label: &str, err: khronos_egl::Error) -> RenderError {
    RenderError::Egl {
        label: label.to_string(),
        code: err.native(),
        message: err.to_string(),
    }
}

/// Returns a closure that labels an EGL failure, for use with `map_err`.
pub fn egl_at(label: &'static str) -> impl FnOnce(khronos_egl::Error) -> RenderError {
    move |err| egl_error(label, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egl_error_keeps_native_code_and_label() {
        let err = egl_error("eglCreateContext", khronos_egl::Error::BadMatch);
        match err {
            RenderError::Egl {
                label,
                code,
                message,
            } => {
                assert_eq!(label, "eglCreateContext");
                assert_eq!(code, khronos_egl::BAD_MATCH);
                assert!(!message.is_empty());
            }
            other => panic!("expected Egl, got {other:?}"),
        }
    }

    #[test]
    fn egl_at_labels_the_error() {
        let err = egl_at("eglInitialize")(khronos_egl::Error::NotInitialized);
        assert!(err.to_string().contains("eglInitialize"), "got: {err}");
    }
}
