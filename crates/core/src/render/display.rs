//! EGL display connection and surface config selection.
//!
//! A [`DisplayConnection`] is opened once per process by the initiating
//! thread and shared by reference with every session. It must outlive every
//! surface and context created from it, which the session runners enforce by
//! joining all workers before [`DisplayConnection::terminate`] is called.

use super::check::{egl_at, egl_error};
use crate::error::RenderError;
use khronos_egl as egl;
use serde::Serialize;

/// Dynamically loaded EGL 1.4 entry points.
pub type Egl = egl::DynamicInstance<egl::EGL1_4>;

/// `EGL_OPENGL_ES3_BIT`, only named by EGL 1.5 headers.
pub const OPENGL_ES3_BIT: egl::Int = 0x0040;

/// Attributes used to pick the shared surface config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayOptions {
    /// `EGL_CONTEXT_CLIENT_VERSION` every context requests.
    pub client_version: i32,
    /// Minimum bits for each of red, green and blue.
    pub color_bits: i32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            client_version: 2,
            color_bits: 8,
        }
    }
}

impl DisplayOptions {
    /// `eglChooseConfig` attribute list for these options.
    pub fn config_attribs(&self) -> [egl::Int; 11] {
        [
            egl::SURFACE_TYPE,
            egl::PBUFFER_BIT,
            egl::RED_SIZE,
            self.color_bits,
            egl::GREEN_SIZE,
            self.color_bits,
            egl::BLUE_SIZE,
            self.color_bits,
            egl::RENDERABLE_TYPE,
            OPENGL_ES3_BIT,
            egl::NONE,
        ]
    }
}

/// An initialized EGL display, released exactly once.
pub struct DisplayConnection {
    egl: Egl,
    display: egl::Display,
    version: (i32, i32),
    live: bool,
}

// SAFETY: EGLDisplay is a process-wide handle that EGL allows to be used
// from any thread. Only `terminate` releases it, and it takes `self`, so no
// shared borrow can observe a released display.
#[allow(unsafe_code)]
unsafe impl Send for DisplayConnection {}
// SAFETY: see above. Every method takes `&self` and only issues EGL calls
// that are thread-safe per the EGL 1.4 specification.
#[allow(unsafe_code)]
unsafe impl Sync for DisplayConnection {}

impl DisplayConnection {
    /// Loads libEGL, opens the default display and initializes it.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Load` if libEGL cannot be loaded, or
    /// `RenderError::Egl` if the default display is unavailable or fails to
    /// initialize.
    #[allow(unsafe_code)]
    pub fn open() -> Result<Self, RenderError> {
        // SAFETY: loading libEGL runs its initializers; nothing else in the
        // process depends on them having run or not.
        let egl = unsafe { Egl::load_required() }.map_err(|e| RenderError::Load(e.to_string()))?;

        // SAFETY: EGL_DEFAULT_DISPLAY is always a valid native display id.
        let display = unsafe { egl.get_display(egl::DEFAULT_DISPLAY) }.ok_or_else(|| {
            let err = egl.get_error().unwrap_or(egl::Error::BadDisplay);
            egl_error("eglGetDisplay", err)
        })?;

        let version = egl
            .initialize(display)
            .map_err(egl_at("eglInitialize"))?;

        log::info!(
            "{:?} opened EGL {}.{} display {:p}",
            std::thread::current().id(),
            version.0,
            version.1,
            display.as_ptr()
        );

        Ok(Self {
            egl,
            display,
            version,
            live: true,
        })
    }

    pub fn egl(&self) -> &Egl {
        &self.egl
    }

    pub fn raw(&self) -> egl::Display {
        self.display
    }

    /// EGL major/minor version reported by `eglInitialize`.
    pub fn version(&self) -> (i32, i32) {
        self.version
    }

    /// Number of configs the display exposes in total.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Egl` if the query fails.
    pub fn config_count(&self) -> Result<usize, RenderError> {
        self.egl
            .get_config_count(self.display)
            .map_err(egl_at("eglGetConfigs"))
    }

    /// Chooses the pbuffer-capable config every session will share and
    /// binds the OpenGL ES API on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::NoConfig` if no config matches, or
    /// `RenderError::Egl` if a query or `eglBindAPI` fails.
    pub fn choose_config(&self, options: &DisplayOptions) -> Result<SurfaceConfig, RenderError> {
        let total = self.config_count()?;
        let attribs = options.config_attribs();

        let mut matching = Vec::with_capacity(total);
        self.egl
            .choose_config(self.display, &attribs, &mut matching)
            .map_err(egl_at("eglChooseConfig"))?;
        if matching.is_empty() || matching.len() > total {
            return Err(RenderError::NoConfig(total));
        }

        let config = self
            .egl
            .choose_first_config(self.display, &attribs)
            .map_err(egl_at("eglChooseConfig"))?
            .ok_or(RenderError::NoConfig(total))?;

        self.egl
            .bind_api(egl::OPENGL_ES_API)
            .map_err(egl_at("eglBindAPI"))?;

        log::info!(
            "{:?} display {:p} config {:p} ({} of {} configs match)",
            std::thread::current().id(),
            self.display.as_ptr(),
            config.as_ptr(),
            matching.len(),
            total
        );

        Ok(SurfaceConfig {
            config,
            client_version: options.client_version,
            matching: matching.len(),
        })
    }

    /// Vendor, version and config count of the display.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Egl` if a query fails.
    pub fn describe(&self) -> Result<DisplayInfo, RenderError> {
        let query = |name, label| {
            self.egl
                .query_string(Some(self.display), name)
                .map(|s| s.to_string_lossy().into_owned())
                .map_err(egl_at(label))
        };
        Ok(DisplayInfo {
            version: self.version,
            vendor: query(egl::VENDOR, "eglQueryString(EGL_VENDOR)")?,
            version_string: query(egl::VERSION, "eglQueryString(EGL_VERSION)")?,
            client_apis: query(egl::CLIENT_APIS, "eglQueryString(EGL_CLIENT_APIS)")?,
            config_count: self.config_count()?,
        })
    }

    /// Releases the display. Call only after every context and surface
    /// created from it has been destroyed.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Egl` if `eglTerminate` fails.
    pub fn terminate(mut self) -> Result<(), RenderError> {
        self.live = false;
        self.egl
            .terminate(self.display)
            .map_err(egl_at("eglTerminate"))?;
        log::info!("terminated display {:p}", self.display.as_ptr());
        Ok(())
    }
}

impl Drop for DisplayConnection {
    fn drop(&mut self) {
        if self.live {
            self.live = false;
            if let Err(e) = self.egl.terminate(self.display) {
                log::error!("{}", egl_error("eglTerminate", e));
            }
        }
    }
}

/// The config chosen once for every session's surface and context.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceConfig {
    config: egl::Config,
    client_version: i32,
    matching: usize,
}

// SAFETY: an EGLConfig is an immutable descriptor owned by the display and
// valid on any thread for as long as the display is initialized.
#[allow(unsafe_code)]
unsafe impl Send for SurfaceConfig {}
// SAFETY: see above.
#[allow(unsafe_code)]
unsafe impl Sync for SurfaceConfig {}

impl SurfaceConfig {
    pub fn raw(&self) -> egl::Config {
        self.config
    }

    pub fn client_version(&self) -> i32 {
        self.client_version
    }

    /// How many configs matched the requested attributes.
    pub fn matching(&self) -> usize {
        self.matching
    }

    /// `eglCreateContext` attribute list.
    pub fn context_attribs(&self) -> [egl::Int; 3] {
        [egl::CONTEXT_CLIENT_VERSION, self.client_version, egl::NONE]
    }
}

/// `eglCreatePbufferSurface` attribute list for a `width` x `height` surface.
pub fn pbuffer_attribs(width: i32, height: i32) -> [egl::Int; 5] {
    [egl::WIDTH, width, egl::HEIGHT, height, egl::NONE]
}

/// Identification strings of an EGL display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub version: (i32, i32),
    pub vendor: String,
    pub version_string: String,
    pub client_apis: String,
    pub config_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_request_es2_and_8_bit_color() {
        let options = DisplayOptions::default();
        assert_eq!(options.client_version, 2);
        let attribs = options.config_attribs();
        assert_eq!(attribs[0], egl::SURFACE_TYPE);
        assert_eq!(attribs[1], egl::PBUFFER_BIT);
        assert_eq!(&attribs[2..8], &[egl::RED_SIZE, 8, egl::GREEN_SIZE, 8, egl::BLUE_SIZE, 8]);
        assert_eq!(attribs[8], egl::RENDERABLE_TYPE);
        assert_eq!(attribs[9], OPENGL_ES3_BIT);
        assert_eq!(attribs[10], egl::NONE);
    }

    #[test]
    fn pbuffer_attribs_are_none_terminated() {
        assert_eq!(
            pbuffer_attribs(512, 256),
            [egl::WIDTH, 512, egl::HEIGHT, 256, egl::NONE]
        );
    }

    #[test]
    fn shared_handles_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DisplayConnection>();
        assert_send_sync::<SurfaceConfig>();
    }

    #[test]
    #[ignore = "requires an EGL display"]
    fn opens_and_chooses_a_config() {
        let display = DisplayConnection::open().unwrap();
        let config = display.choose_config(&DisplayOptions::default()).unwrap();
        assert!(config.matching() >= 1);
        assert!(display.config_count().unwrap() >= config.matching());
        display.terminate().unwrap();
    }
}
