//! Session planning and the staggered two-worker orchestration.
//!
//! A session is one offscreen context lifecycle: set up, render and read
//! back one or more passes, tear down. This module holds the GPU-free parts:
//! what a session should do ([`SessionPlan`]), how long it loops
//! ([`PassLimit`], [`CancelToken`]), where frames go ([`FrameSink`]), what it
//! reports ([`SessionReport`]), and [`run_staggered`], which runs two
//! workers against one shared resource and joins both before returning.

use crate::buffer::PixelBuffer;
use crate::color::ClearColor;
use crate::error::{DriverFault, RenderError};
use crate::pixel::TargetFormat;
use crate::scene::SceneKind;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default surface width and height, in pixels.
pub const DEFAULT_SIZE: u32 = 512;

/// Default delay between starting the first and the second session.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(500);

/// Shared flag a looping session checks before every pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How many render + readback passes a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassLimit {
    /// Exactly this many passes, unless cancelled earlier.
    Count(NonZeroU32),
    /// Until the session's [`CancelToken`] is cancelled.
    UntilCancelled,
}

impl PassLimit {
    /// A single pass.
    pub const ONCE: PassLimit = PassLimit::Count(NonZeroU32::MIN);

    /// Builds a limit from a CLI-style count where 0 means "until cancelled".
    pub fn from_count(count: u32) -> Self {
        NonZeroU32::new(count).map_or(PassLimit::UntilCancelled, PassLimit::Count)
    }

    /// Whether pass number `completed` (0-based count of passes already run)
    /// may start.
    pub fn allows(self, completed: u32, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        match self {
            PassLimit::Count(n) => completed < n.get(),
            PassLimit::UntilCancelled => true,
        }
    }
}

impl Default for PassLimit {
    fn default() -> Self {
        PassLimit::ONCE
    }
}

/// Everything one session needs besides the shared display and config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub scene: SceneKind,
    pub target_format: TargetFormat,
    pub clear_color: ClearColor,
    pub passes: PassLimit,
    pub output: PathBuf,
}

impl SessionPlan {
    /// Plan for the single-session program: one triangle pass into `img.png`.
    pub fn single() -> Self {
        Self {
            name: "main".into(),
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            scene: SceneKind::Triangle,
            target_format: TargetFormat::Rgb8,
            clear_color: ClearColor::TRANSPARENT,
            passes: PassLimit::ONCE,
            output: PathBuf::from("img.png"),
        }
    }

    /// Plan for the looping first session of the concurrent program.
    pub fn primary(passes: PassLimit) -> Self {
        Self {
            name: "primary".into(),
            scene: SceneKind::TexturedQuad,
            passes,
            ..Self::single()
        }
    }

    /// Plan for the one-shot second session of the concurrent program.
    pub fn secondary() -> Self {
        Self {
            name: "secondary".into(),
            output: PathBuf::from("img2.png"),
            ..Self::single()
        }
    }

    /// Checks the plan can be rendered at all.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDimensions` if width or height is zero or
    /// does not fit a GL size.
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = RenderError::InvalidDimensions {
            width: self.width,
            height: self.height,
        };
        if self.width == 0 || self.height == 0 {
            return Err(invalid);
        }
        if i32::try_from(self.width).is_err() || i32::try_from(self.height).is_err() {
            return Err(invalid);
        }
        Ok(())
    }
}

/// Receives every frame a session reads back.
///
/// A sink error is treated as a steady-state fault: the session records it
/// and keeps going.
pub trait FrameSink {
    fn consume(&mut self, plan: &SessionPlan, pass: u32, frame: &PixelBuffer)
        -> Result<(), RenderError>;
}

/// Sink that drops every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl FrameSink for DiscardSink {
    fn consume(&mut self, _: &SessionPlan, _: u32, _: &PixelBuffer) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Sink that keeps the most recent frame, for inspection after a run.
#[derive(Debug, Default, Clone)]
pub struct LastFrame(pub Option<PixelBuffer>);

impl FrameSink for LastFrame {
    fn consume(&mut self, _: &SessionPlan, _: u32, frame: &PixelBuffer) -> Result<(), RenderError> {
        self.0 = Some(frame.clone());
        Ok(())
    }
}

/// What a session did, once it has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub name: String,
    pub passes: u32,
    pub frame_bytes: usize,
    pub faults: Vec<DriverFault>,
}

impl SessionReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passes: 0,
            frame_bytes: 0,
            faults: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Runs `worker` for `first` on a new thread, waits `stagger`, runs it for
/// `second` on another thread, and joins both.
///
/// Both workers borrow `shared` for their whole lifetime; the scope
/// guarantees neither outlives this call, so the caller may release
/// `shared` as soon as this returns. A panicking worker is reported as
/// `RenderError::WorkerPanicked` for its own session only.
pub fn run_staggered<S, T, F>(
    shared: &S,
    first: &SessionPlan,
    second: &SessionPlan,
    stagger: Duration,
    worker: F,
) -> [Result<T, RenderError>; 2]
where
    S: Sync + ?Sized,
    T: Send,
    F: Fn(&S, &SessionPlan) -> Result<T, RenderError> + Sync,
{
    let worker = &worker;
    thread::scope(|scope| {
        let spawn = |plan: &'_ SessionPlan| {
            let plan = plan.clone();
            thread::Builder::new()
                .name(format!("session-{}", plan.name))
                .spawn_scoped(scope, move || worker(shared, &plan))
        };

        let a = spawn(first);
        thread::sleep(stagger);
        let b = spawn(second);

        [join(first, a), join(second, b)]
    })
}

fn join<T>(
    plan: &SessionPlan,
    handle: std::io::Result<thread::ScopedJoinHandle<'_, Result<T, RenderError>>>,
) -> Result<T, RenderError> {
    let handle = handle.map_err(|e| RenderError::WorkerPanicked {
        session: plan.name.clone(),
        message: format!("failed to spawn: {e}"),
    })?;
    handle.join().unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".into());
        Err(RenderError::WorkerPanicked {
            session: plan.name.clone(),
            message,
        })
    })
}
