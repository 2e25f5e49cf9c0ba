//! End-to-end rendering against a real EGL display.
//!
//! Run with `cargo test -p offscreen-gl-core --features render -- --ignored`
//! on a machine with a working EGL implementation (Mesa's surfaceless or
//! llvmpipe driver is enough).
#![cfg(feature = "render")]

use offscreen_gl_core::render::{
    run_concurrent, run_single, DisplayConnection, DisplayOptions, OffscreenContext, Program,
    SurfaceConfig,
};
use offscreen_gl_core::scene::ShaderSource;
use offscreen_gl_core::session::LastFrame;
use offscreen_gl_core::{
    CancelToken, ClearColor, ContextState, FrameSink, PassLimit, PixelBuffer, RenderError,
    SceneKind, SessionPlan, ShaderError, Stage, TargetFormat,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const RED: [u8; 4] = [255, 0, 0, 255];

/// Every test opens the same default display, and terminating it from one
/// test would pull it out from under another.
static DISPLAY_LOCK: Mutex<()> = Mutex::new(());

fn open() -> (MutexGuard<'static, ()>, DisplayConnection, SurfaceConfig) {
    let guard = DISPLAY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let display = DisplayConnection::open().expect("open the default EGL display");
    let config = display
        .choose_config(&DisplayOptions::default())
        .expect("an RGB888 pbuffer config");
    (guard, display, config)
}

/// Keeps every frame of every session it is cloned into.
#[derive(Clone, Default)]
struct SharedFrames(Arc<Mutex<Vec<(String, PixelBuffer)>>>);

impl FrameSink for SharedFrames {
    fn consume(
        &mut self,
        plan: &SessionPlan,
        _pass: u32,
        frame: &PixelBuffer,
    ) -> Result<(), RenderError> {
        let mut frames = self.0.lock().unwrap_or_else(|e| e.into_inner());
        frames.push((plan.name.clone(), frame.clone()));
        Ok(())
    }
}

/// Cancels its token once `after` frames have been consumed.
struct CancelAfter {
    cancel: CancelToken,
    after: u32,
    seen: u32,
}

impl FrameSink for CancelAfter {
    fn consume(&mut self, _: &SessionPlan, _: u32, _: &PixelBuffer) -> Result<(), RenderError> {
        self.seen += 1;
        if self.seen >= self.after {
            self.cancel.cancel();
        }
        Ok(())
    }
}

fn small_plan(name: &str, scene: SceneKind) -> SessionPlan {
    SessionPlan {
        name: name.into(),
        width: 64,
        height: 48,
        scene,
        ..SessionPlan::single()
    }
}

#[test]
#[ignore = "requires an EGL display"]
fn clear_only_pass_reads_back_the_clear_color() {
    let (_guard, display, config) = open();

    for format in [TargetFormat::Rgb8, TargetFormat::Rgba8] {
        let plan = SessionPlan {
            clear_color: ClearColor::new(0.2, 0.3, 0.3, 1.0),
            target_format: format,
            ..small_plan("clear", SceneKind::Clear)
        };
        let mut sink = LastFrame::default();
        let report =
            run_single(&display, &config, &plan, &mut sink, &CancelToken::new()).unwrap();
        assert!(report.is_clean(), "faults: {:?}", report.faults);

        let frame = sink.0.expect("one frame");
        assert_eq!(frame.as_bytes().len(), 64 * 4 * 48);
        let expected = plan.clear_color.expected_readback(format.has_alpha());
        assert!(frame.is_uniform(expected), "{format:?}: not uniform {expected:?}");
    }

    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn triangle_covers_the_center_and_not_the_corners() {
    let (_guard, display, config) = open();
    let plan = small_plan("triangle", SceneKind::Triangle);

    let mut sink = LastFrame::default();
    let report =
        run_single(&display, &config, &plan, &mut sink, &CancelToken::new()).unwrap();
    assert_eq!(report.passes, 1);
    assert!(report.is_clean(), "faults: {:?}", report.faults);

    let frame = sink.0.expect("one frame");
    let background = plan.clear_color.expected_readback(false);
    assert_eq!(frame.pixel(32, 24), Some(RED));
    for (x, y) in [(0, 0), (63, 0), (0, 47), (63, 47)] {
        assert_eq!(frame.pixel(x, y), Some(background), "corner ({x}, {y})");
    }
    let red = frame.count_matching(RED);
    let cleared = frame.count_matching(background);
    assert!(red > 0 && cleared > 0);
    assert_eq!(red + cleared, 64 * 48, "pixels other than red or background");

    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn textured_quad_samples_all_four_texels() {
    let (_guard, display, config) = open();
    let plan = small_plan("quad", SceneKind::TexturedQuad);

    let mut sink = LastFrame::default();
    run_single(&display, &config, &plan, &mut sink, &CancelToken::new()).unwrap();
    let frame = sink.0.expect("one frame");

    for rgba in [RED, [0, 255, 0, 255], [0, 0, 255, 255], [255, 255, 0, 255]] {
        assert!(frame.count_matching(rgba) > 0, "missing texel {rgba:?}");
    }

    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn two_sessions_render_independently_on_one_display() {
    let (_guard, display, config) = open();

    let first = SessionPlan {
        passes: PassLimit::from_count(3),
        clear_color: ClearColor::new(0.0, 0.0, 1.0, 1.0),
        ..small_plan("first", SceneKind::Clear)
    };
    let second = SessionPlan {
        width: 32,
        height: 30,
        ..small_plan("second", SceneKind::Triangle)
    };

    let [a, b] = run_concurrent(
        &display,
        &config,
        [&first, &second],
        Duration::from_millis(50),
        &CancelToken::new(),
        |_| LastFrame::default(),
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.passes, 3);
    assert_eq!(b.passes, 1);
    assert_eq!(a.frame_bytes, 64 * 4 * 48);
    assert_eq!(b.frame_bytes, 32 * 4 * 30);
    assert!(a.is_clean() && b.is_clean(), "faults: {a:?} {b:?}");

    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn concurrent_sessions_do_not_see_each_others_pixels() {
    let (_guard, display, config) = open();

    let blue = ClearColor::new(0.0, 0.0, 1.0, 1.0);
    let looping = SessionPlan {
        passes: PassLimit::from_count(50),
        clear_color: blue,
        ..small_plan("looping", SceneKind::Clear)
    };
    let triangle = small_plan("triangle", SceneKind::Triangle);

    let frames = SharedFrames::default();
    let [a, b] = run_concurrent(
        &display,
        &config,
        [&looping, &triangle],
        Duration::from_millis(10),
        &CancelToken::new(),
        |_| frames.clone(),
    );
    assert_eq!(a.unwrap().passes, 50);
    assert_eq!(b.unwrap().passes, 1);
    display.terminate().unwrap();

    let frames = frames.0.lock().unwrap();
    assert_eq!(frames.len(), 51);
    let background = triangle.clear_color.expected_readback(false);
    for (name, frame) in frames.iter() {
        if name == "looping" {
            let expected = blue.expected_readback(false);
            assert!(frame.is_uniform(expected), "looping frame not uniform blue");
        } else {
            let red = frame.count_matching(RED);
            assert!(red > 0, "triangle frame has no red");
            assert_eq!(
                red + frame.count_matching(background),
                64 * 48,
                "triangle frame has foreign pixels"
            );
        }
    }
}

#[test]
#[ignore = "requires an EGL display"]
fn cancelling_mid_loop_finishes_the_pass_and_tears_down() {
    let (_guard, display, config) = open();
    let plan = SessionPlan {
        passes: PassLimit::UntilCancelled,
        ..small_plan("until-cancelled", SceneKind::Clear)
    };

    let cancel = CancelToken::new();
    let mut sink = CancelAfter {
        cancel: cancel.clone(),
        after: 3,
        seen: 0,
    };
    let report = run_single(&display, &config, &plan, &mut sink, &cancel).unwrap();
    assert_eq!(report.passes, 3);
    assert!(report.is_clean(), "faults: {:?}", report.faults);

    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn cancelled_session_stops_before_its_first_pass() {
    let (_guard, display, config) = open();
    let plan = SessionPlan {
        passes: PassLimit::UntilCancelled,
        ..small_plan("looping", SceneKind::Clear)
    };

    let cancel = CancelToken::new();
    cancel.cancel();
    let [a, b] = run_concurrent(
        &display,
        &config,
        [&plan, &plan],
        Duration::ZERO,
        &cancel,
        |_| LastFrame::default(),
    );
    assert_eq!(a.unwrap().passes, 0);
    assert_eq!(b.unwrap().passes, 0);

    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn malformed_shader_fails_to_compile_with_a_log() {
    let (_guard, display, config) = open();
    let mut ctx = OffscreenContext::new(&display, &config, 8, 8).unwrap();
    ctx.create_surface().unwrap();
    ctx.create_context(None).unwrap();
    ctx.make_current().unwrap();

    let broken = ShaderSource {
        vertex: "attribute vec4 a_position;\nvoid main() { gl_Position = a_position }\n",
        ..SceneKind::Triangle.shader_source().unwrap()
    };
    ctx.with_gl(|gl| match Program::build(gl, &broken) {
        Err(ShaderError::Compile { stage, log }) => {
            assert_eq!(stage, Stage::Vertex);
            assert!(!log.is_empty());
            assert!(log.contains("1: attribute vec4 a_position;"), "got:\n{log}");
        }
        other => panic!("expected a compile error, got {other:?}"),
    })
    .unwrap();

    drop(ctx);
    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn lifecycle_rejects_out_of_order_calls_and_tears_down_once() {
    let (_guard, display, config) = open();
    let mut ctx = OffscreenContext::new(&display, &config, 8, 8).unwrap();

    assert!(matches!(
        ctx.make_current(),
        Err(RenderError::InvalidState { .. })
    ));
    assert!(matches!(
        ctx.read_back(),
        Err(RenderError::InvalidState { .. })
    ));

    ctx.create_surface().unwrap();
    ctx.create_context(None).unwrap();
    ctx.make_current().unwrap();
    ctx.attach_target(TargetFormat::Rgb8).unwrap();
    assert_eq!(ctx.state(), ContextState::Current);

    ctx.teardown();
    ctx.teardown();
    assert_eq!(ctx.state(), ContextState::Destroyed);
    assert!(ctx.faults().is_empty(), "faults: {:?}", ctx.faults());

    drop(ctx);
    display.terminate().unwrap();
}

#[test]
#[ignore = "requires an EGL display"]
fn context_refuses_calls_once_another_is_made_current() {
    let (_guard, display, config) = open();

    let mut first = OffscreenContext::new(&display, &config, 8, 8).unwrap();
    first.create_surface().unwrap();
    first.create_context(None).unwrap();
    first.make_current().unwrap();
    assert!(first.gl_info().is_ok());

    let mut second = OffscreenContext::new(&display, &config, 8, 8).unwrap();
    second.create_surface().unwrap();
    second.create_context(Some(&first)).unwrap();
    second.make_current().unwrap();

    assert!(matches!(first.gl_info(), Err(RenderError::NotCurrent)));
    assert!(second.gl_info().is_ok());

    drop(second);
    drop(first);
    display.terminate().unwrap();
}
