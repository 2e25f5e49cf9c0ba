#![deny(unsafe_code)]
//! CLI binary for offscreen-gl.
//!
//! Subcommands:
//! - `render`: one offscreen session on the main thread, write `img.png`
//! - `concurrent`: two sessions on two threads sharing one display,
//!   write `img.png` and `img2.png`
//! - `info`: print EGL and GL driver identification

mod error;
mod logging;

use clap::{Args, Parser, Subcommand};
use error::CliError;
use logging::{init_logging, LoggingConfig};
use offscreen_gl_core::render::{
    run_concurrent, run_single, DisplayConnection, DisplayOptions, OffscreenContext,
};
use offscreen_gl_core::session::{DEFAULT_SIZE, DEFAULT_STAGGER};
use offscreen_gl_core::{
    CancelToken, ClearColor, PassLimit, RenderError, SceneKind, SessionPlan, SessionReport,
    TargetFormat,
};
use offscreen_gl_snapshot::{PngSink, RowOrder};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "offscreen-gl", about = "Offscreen EGL pbuffer rendering with readback")]
struct Cli {
    /// Output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Log filter in env_logger syntax (overrides RUST_LOG).
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Surface and context parameters shared by every rendering subcommand.
#[derive(Debug, Args)]
struct SurfaceArgs {
    /// Pbuffer width in pixels.
    #[arg(short = 'W', long, default_value_t = DEFAULT_SIZE)]
    width: u32,

    /// Pbuffer height in pixels.
    #[arg(short = 'H', long, default_value_t = DEFAULT_SIZE)]
    height: u32,

    /// EGL_CONTEXT_CLIENT_VERSION requested for every context.
    #[arg(long, default_value_t = 2)]
    client_version: i32,

    /// Render target storage (rgb8, rgba8).
    #[arg(long, default_value = "rgb8")]
    target_format: TargetFormat,

    /// Clear color as "r,g,b,a" in [0, 1].
    #[arg(long, default_value = "0,0,0,0", value_parser = parse_clear_color)]
    clear: ClearColor,

    /// Write PNG rows top-down instead of in GL readback order.
    #[arg(long)]
    flip: bool,
}

impl SurfaceArgs {
    fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            client_version: self.client_version,
            ..DisplayOptions::default()
        }
    }

    fn apply(&self, plan: SessionPlan) -> SessionPlan {
        SessionPlan {
            width: self.width,
            height: self.height,
            target_format: self.target_format,
            clear_color: self.clear,
            ..plan
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render one session on this thread and write a PNG.
    Render {
        #[command(flatten)]
        surface: SurfaceArgs,

        /// Scene to draw (clear, triangle, textured-quad).
        #[arg(long, default_value = "triangle")]
        scene: SceneKind,

        /// Render + readback passes; 0 repeats until Ctrl-C or SIGTERM.
        #[arg(long, default_value_t = 1)]
        passes: u32,

        /// Output file path.
        #[arg(short, long, default_value = "img.png")]
        output: PathBuf,
    },
    /// Render two sessions on two threads sharing one display.
    Concurrent {
        #[command(flatten)]
        surface: SurfaceArgs,

        /// Passes of the first session; 0 repeats until Ctrl-C or SIGTERM.
        #[arg(long, default_value_t = 1)]
        passes: u32,

        /// Delay between starting the first and second session.
        #[arg(long, default_value_t = DEFAULT_STAGGER.as_millis() as u64)]
        stagger_ms: u64,

        /// Scene of the first session.
        #[arg(long, default_value = "textured-quad")]
        primary_scene: SceneKind,

        /// Scene of the second session.
        #[arg(long, default_value = "triangle")]
        secondary_scene: SceneKind,

        /// Output of the first session.
        #[arg(long, default_value = "img.png")]
        primary_output: PathBuf,

        /// Output of the second session.
        #[arg(long, default_value = "img2.png")]
        secondary_output: PathBuf,
    },
    /// Print EGL display and GL driver identification.
    Info {
        /// EGL_CONTEXT_CLIENT_VERSION requested for the probe context.
        #[arg(long, default_value_t = 2)]
        client_version: i32,
    },
}

fn parse_clear_color(s: &str) -> Result<ClearColor, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid clear color '{s}': {e}"))?;
    match parts.as_slice() {
        &[r, g, b, a] if parts.iter().all(|v| (0.0..=1.0).contains(v)) => {
            Ok(ClearColor::new(r, g, b, a))
        }
        &[_, _, _, _] => Err(format!("clear color components must be in [0, 1]: '{s}'")),
        _ => Err(format!("expected 4 comma-separated components, got '{s}'")),
    }
}

fn report_json(report: &SessionReport, plan: &SessionPlan) -> serde_json::Value {
    serde_json::json!({
        "session": report.name,
        "output": plan.output.display().to_string(),
        "width": plan.width,
        "height": plan.height,
        "scene": plan.scene,
        "passes": report.passes,
        "frame_bytes": report.frame_bytes,
        "faults": report.faults,
    })
}

fn report_text(report: &SessionReport, plan: &SessionPlan) {
    eprintln!(
        "rendered {} ({}x{}, {}, {} passes) -> {}",
        report.name,
        plan.width,
        plan.height,
        plan.scene,
        report.passes,
        plan.output.display()
    );
    for fault in &report.faults {
        eprintln!("  fault: {fault}");
    }
}

/// Token cancelled on Ctrl-C or SIGTERM, so looping sessions stop after
/// their current pass and release the display normally.
fn cancel_on_signal() -> CancelToken {
    let cancel = CancelToken::new();
    let handle = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("stop requested, finishing the current pass");
        handle.cancel();
    }) {
        log::warn!("cannot install stop handler: {e}");
    }
    cancel
}

/// Error to exit with once sessions are reported and the display is
/// released. A session's own error wins; a release failure behind it is
/// only logged.
fn exit_error(
    session: Option<RenderError>,
    released: Result<(), RenderError>,
) -> Result<(), CliError> {
    match (session, released) {
        (None, released) => released.map_err(CliError::from),
        (Some(err), released) => {
            if let Err(e) = released {
                log::error!("{e}");
            }
            Err(err.into())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Render {
            surface,
            scene,
            passes,
            output,
        } => {
            let plan = surface.apply(SessionPlan {
                scene,
                passes: PassLimit::from_count(passes),
                output,
                ..SessionPlan::single()
            });
            plan.validate()?;

            let display = DisplayConnection::open()?;
            let config = display.choose_config(&surface.display_options())?;
            let mut sink = PngSink::new(RowOrder::from_flip(surface.flip));
            let result = run_single(&display, &config, &plan, &mut sink, &cancel_on_signal());
            let released = display.terminate();

            if let Ok(report) = &result {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&report_json(report, &plan))?);
                } else {
                    report_text(report, &plan);
                }
            }
            exit_error(result.err(), released)?;
        }
        Command::Concurrent {
            surface,
            passes,
            stagger_ms,
            primary_scene,
            secondary_scene,
            primary_output,
            secondary_output,
        } => {
            let primary = surface.apply(SessionPlan {
                scene: primary_scene,
                output: primary_output,
                ..SessionPlan::primary(PassLimit::from_count(passes))
            });
            let secondary = surface.apply(SessionPlan {
                scene: secondary_scene,
                output: secondary_output,
                ..SessionPlan::secondary()
            });
            primary.validate()?;

            let display = DisplayConnection::open()?;
            let config = display.choose_config(&surface.display_options())?;
            let order = RowOrder::from_flip(surface.flip);
            let results = run_concurrent(
                &display,
                &config,
                [&primary, &secondary],
                Duration::from_millis(stagger_ms),
                &cancel_on_signal(),
                |_| PngSink::new(order),
            );
            let released = display.terminate();

            let plans = [&primary, &secondary];
            if cli.json {
                let sessions: Vec<serde_json::Value> = results
                    .iter()
                    .zip(plans)
                    .map(|(result, plan)| match result {
                        Ok(report) => report_json(report, plan),
                        Err(e) => serde_json::json!({
                            "session": plan.name,
                            "error": e.to_string(),
                        }),
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "sessions": sessions }))?
                );
            } else {
                for (result, plan) in results.iter().zip(plans) {
                    match result {
                        Ok(report) => report_text(report, plan),
                        Err(e) => eprintln!("session {} failed: {e}", plan.name),
                    }
                }
            }

            exit_error(results.into_iter().find_map(Result::err), released)?;
        }
        Command::Info { client_version } => {
            let display = DisplayConnection::open()?;
            let info = display.describe()?;
            let config = display.choose_config(&DisplayOptions {
                client_version,
                ..DisplayOptions::default()
            })?;

            let gl_info = {
                let mut probe = OffscreenContext::new(&display, &config, 1, 1)?;
                probe.create_surface()?;
                probe.create_context(None)?;
                probe.make_current()?;
                probe.gl_info()?
            };
            display.terminate()?;

            if cli.json {
                let out = serde_json::json!({
                    "egl": info,
                    "matching_configs": config.matching(),
                    "gl": gl_info,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("EGL {}.{} ({})", info.version.0, info.version.1, info.version_string);
                println!("  vendor:      {}", info.vendor);
                println!("  client APIs: {}", info.client_apis);
                println!("  configs:     {} ({} match)", info.config_count, config.matching());
                println!("GL {}", gl_info.version);
                println!("  vendor:      {}", gl_info.vendor);
                println!("  renderer:    {}", gl_info.renderer);
                println!(
                    "  read format: {:#06x} type {:#06x}",
                    gl_info.read_format, gl_info.read_type
                );
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;
    init_logging(if json_mode {
        LoggingConfig::for_json(cli.log.clone())
    } else {
        LoggingConfig {
            env_filter: cli.log.clone(),
            ..LoggingConfig::default()
        }
    });

    if let Err(e) = run(cli) {
        if json_mode {
            let j = serde_json::json!({"error": e.to_string(), "exit_code": e.exit_code()});
            eprintln!("{}", serde_json::to_string_pretty(&j).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn render_defaults_match_reference_program() {
        let cli = Cli::try_parse_from(["offscreen-gl", "render"]).unwrap();
        let Command::Render {
            surface,
            scene,
            passes,
            output,
        } = cli.command
        else {
            panic!("expected render");
        };
        assert_eq!((surface.width, surface.height), (512, 512));
        assert_eq!(surface.client_version, 2);
        assert_eq!(surface.target_format, TargetFormat::Rgb8);
        assert_eq!(surface.clear, ClearColor::TRANSPARENT);
        assert!(!surface.flip);
        assert_eq!(scene, SceneKind::Triangle);
        assert_eq!(passes, 1);
        assert_eq!(output, PathBuf::from("img.png"));
    }

    #[test]
    fn concurrent_defaults_match_reference_program() {
        let cli = Cli::try_parse_from(["offscreen-gl", "--json", "concurrent"]).unwrap();
        assert!(cli.json);
        let Command::Concurrent {
            stagger_ms,
            primary_scene,
            secondary_scene,
            primary_output,
            secondary_output,
            ..
        } = cli.command
        else {
            panic!("expected concurrent");
        };
        assert_eq!(stagger_ms, 500);
        assert_eq!(primary_scene, SceneKind::TexturedQuad);
        assert_eq!(secondary_scene, SceneKind::Triangle);
        assert_eq!(primary_output, PathBuf::from("img.png"));
        assert_eq!(secondary_output, PathBuf::from("img2.png"));
    }

    #[test]
    fn surface_args_flow_into_plans() {
        let cli = Cli::try_parse_from([
            "offscreen-gl",
            "render",
            "-W",
            "64",
            "-H",
            "32",
            "--target-format",
            "rgba8",
            "--clear",
            "0.2,0.4,0.6,1",
            "--scene",
            "clear",
        ])
        .unwrap();
        let Command::Render { surface, scene, .. } = cli.command else {
            panic!("expected render");
        };
        let plan = surface.apply(SessionPlan {
            scene,
            ..SessionPlan::single()
        });
        assert_eq!((plan.width, plan.height), (64, 32));
        assert_eq!(plan.target_format, TargetFormat::Rgba8);
        assert_eq!(plan.clear_color.to_rgba8(), [51, 102, 153, 255]);
        assert_eq!(plan.scene, SceneKind::Clear);
    }

    #[test]
    fn unknown_scene_is_rejected() {
        assert!(Cli::try_parse_from(["offscreen-gl", "render", "--scene", "cube"]).is_err());
    }

    #[test]
    fn clear_color_parsing() {
        assert_eq!(
            parse_clear_color("1, 0, 0, 1"),
            Ok(ClearColor::new(1.0, 0.0, 0.0, 1.0))
        );
        assert!(parse_clear_color("1,0,0").unwrap_err().contains("4 comma-separated"));
        assert!(parse_clear_color("2,0,0,1").unwrap_err().contains("[0, 1]"));
        assert!(parse_clear_color("red,0,0,1").unwrap_err().contains("invalid"));
    }

    #[test]
    fn malformed_clear_color_is_a_usage_error() {
        let err = Cli::try_parse_from(["offscreen-gl", "render", "--clear", "1,0"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn session_error_wins_over_release_failure() {
        let session = RenderError::NotCurrent;
        let released = Err(RenderError::Io("terminate".into()));
        let err = exit_error(Some(session), released).unwrap_err();
        assert_eq!(err.exit_code(), 10);
        assert!(err.to_string().contains("not current"), "got: {err}");
    }

    #[test]
    fn release_failure_is_reported_when_sessions_succeed() {
        assert!(exit_error(None, Ok(())).is_ok());
        let err = exit_error(None, Err(RenderError::Io("terminate".into()))).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }

    #[test]
    fn report_json_includes_faults_and_output() {
        let plan = SessionPlan::secondary();
        let mut report = SessionReport::new(&plan.name);
        report.passes = 1;
        report.frame_bytes = 1_048_576;
        let json = report_json(&report, &plan);
        assert_eq!(json["session"], "secondary");
        assert_eq!(json["output"], "img2.png");
        assert_eq!(json["frame_bytes"], 1_048_576);
        assert_eq!(json["scene"], "triangle");
        assert!(json["faults"].as_array().unwrap().is_empty());
    }
}
