//! Drives [`OffscreenContext`] sessions: one on the calling thread, or two
//! on staggered worker threads sharing a display.

use super::context::OffscreenContext;
use super::display::{DisplayConnection, SurfaceConfig};
use crate::error::{Phase, RenderError};
use crate::session::{run_staggered, CancelToken, FrameSink, SessionPlan, SessionReport};
use std::thread;
use std::time::Duration;

/// Runs one session to completion on the calling thread.
///
/// Setup failures are returned; everything after setup is recorded in the
/// report. The context is torn down before returning on every path.
///
/// # Errors
///
/// Returns the first setup error: invalid plan, surface/context creation,
/// make-current, render target or scene build.
pub fn run_session(
    display: &DisplayConnection,
    config: &SurfaceConfig,
    plan: &SessionPlan,
    sink: &mut dyn FrameSink,
    cancel: &CancelToken,
) -> Result<SessionReport, RenderError> {
    plan.validate()?;
    log::info!(
        "{:?} session '{}' display {:p} config {:p} {}x{}",
        thread::current().id(),
        plan.name,
        display.raw().as_ptr(),
        config.raw().as_ptr(),
        plan.width,
        plan.height
    );

    let mut ctx = OffscreenContext::new(display, config, plan.width, plan.height)?;
    ctx.create_surface()?;
    ctx.create_context(None)?;
    ctx.make_current()?;
    ctx.attach_target(plan.target_format)?;
    ctx.install_scene(plan.scene)?;

    let mut report = SessionReport::new(&plan.name);
    while plan.passes.allows(report.passes, cancel) {
        let pass = report.passes;
        ctx.draw_pass(plan.clear_color)?;
        match ctx.read_back() {
            Ok(frame) => {
                report.frame_bytes = frame.as_bytes().len();
                match sink.consume(plan, pass, &frame) {
                    Ok(()) => log::info!("session '{}' pass {pass} done", plan.name),
                    Err(e) => ctx.record(Phase::Steady, "frame sink", &e),
                }
            }
            Err(e) => ctx.record(Phase::Steady, "read back", &e),
        }
        report.passes += 1;
    }

    ctx.teardown();
    report.faults = ctx.take_faults();
    Ok(report)
}

/// Runs the single-session program: one session on the calling thread,
/// checking `cancel` before every pass.
///
/// The caller still owns `display` and releases it afterwards.
///
/// # Errors
///
/// See [`run_session`].
pub fn run_single(
    display: &DisplayConnection,
    config: &SurfaceConfig,
    plan: &SessionPlan,
    sink: &mut dyn FrameSink,
    cancel: &CancelToken,
) -> Result<SessionReport, RenderError> {
    run_session(display, config, plan, sink, cancel)
}

/// Runs two sessions on worker threads, `stagger` apart, and joins both.
///
/// Each worker gets its own sink from `make_sink`. Both workers have exited
/// when this returns, so the caller may terminate `display` right after.
/// Both sessions check `cancel` before every pass.
pub fn run_concurrent<K, F>(
    display: &DisplayConnection,
    config: &SurfaceConfig,
    plans: [&SessionPlan; 2],
    stagger: Duration,
    cancel: &CancelToken,
    make_sink: F,
) -> [Result<SessionReport, RenderError>; 2]
where
    K: FrameSink,
    F: Fn(&SessionPlan) -> K + Sync,
{
    let shared = (display, config);
    let [first, second] = plans;
    run_staggered(&shared, first, second, stagger, |&(display, config), plan| {
        let mut sink = make_sink(plan);
        let result = run_session(display, config, plan, &mut sink, cancel);
        if let Err(e) = &result {
            log::error!("session '{}' failed during setup: {e}", plan.name);
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_tuple_is_sync() {
        fn assert_sync<T: Sync>(_: &T) {}
        fn check(display: &DisplayConnection, config: &SurfaceConfig) {
            assert_sync(&(display, config));
        }
        let _ = check;
    }
}
