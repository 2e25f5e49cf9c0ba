//! PNG output of read-back frames.
//!
//! This module is feature-gated behind `png` (default on) so that consumers
//! that only need the row packing in [`crate::pixel`] do not pull in the
//! `image` crate.

use offscreen_gl_core::error::RenderError;
use offscreen_gl_core::session::{FrameSink, SessionPlan};
use offscreen_gl_core::PixelBuffer;
use std::path::{Path, PathBuf};

use crate::pixel::{tight_rows, RowOrder};

/// Writes `frame` as an RGBA PNG with rows in `order`.
///
/// Returns `RenderError::Io` on a size mismatch or write failure.
pub fn write_png(frame: &PixelBuffer, path: &Path, order: RowOrder) -> Result<(), RenderError> {
    let rgba = tight_rows(frame, order);
    let img = image::RgbaImage::from_raw(frame.width(), frame.height(), rgba)
        .ok_or_else(|| RenderError::Io("RGBA buffer size mismatch".into()))?;
    img.save(path)
        .map_err(|e| RenderError::Io(format!("{}: {e}", path.display())))
}

/// [`FrameSink`] that overwrites one PNG file per session every pass.
#[derive(Debug, Clone, Default)]
pub struct PngSink {
    order: RowOrder,
    path: Option<PathBuf>,
}

impl PngSink {
    /// Writes to each session plan's own `output` path.
    pub fn new(order: RowOrder) -> Self {
        Self { order, path: None }
    }

    /// Writes to `path` regardless of the session plan.
    pub fn to_path(order: RowOrder, path: impl Into<PathBuf>) -> Self {
        Self {
            order,
            path: Some(path.into()),
        }
    }

    /// File a frame of `plan` is written to.
    pub fn path_for<'a>(&'a self, plan: &'a SessionPlan) -> &'a Path {
        self.path.as_deref().unwrap_or(&plan.output)
    }
}

impl FrameSink for PngSink {
    fn consume(
        &mut self,
        plan: &SessionPlan,
        pass: u32,
        frame: &PixelBuffer,
    ) -> Result<(), RenderError> {
        let path = self.path_for(plan);
        write_png(frame, path, self.order)?;
        log::info!("finish saving {} (pass {pass})", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x3 frame: bottom row red, middle green, top blue.
    fn striped() -> PixelBuffer {
        let rows: [[u8; 4]; 3] = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]];
        let data = rows.iter().flat_map(|px| px.repeat(2)).collect();
        PixelBuffer::from_raw(2, 3, data).unwrap()
    }

    #[test]
    fn write_png_keeps_gl_row_order_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");

        write_png(&striped(), &path, RowOrder::AsRead).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!((img.width(), img.height()), (2, 3));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 2).0, [0, 0, 255, 255]);
    }

    #[test]
    fn write_png_top_down_flips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flipped.png");

        write_png(&striped(), &path, RowOrder::TopDown).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(0, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn blank_frame_writes_transparent_image() {
        let frame = PixelBuffer::rgba8(5, 4).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zeros.png");

        write_png(&frame, &path, RowOrder::AsRead).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!((img.width(), img.height()), (5, 4));
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn write_png_to_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("img.png");

        let err = write_png(&striped(), &path, RowOrder::AsRead).unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
        assert!(err.to_string().contains("no-such-dir"), "got: {err}");
    }

    #[test]
    fn sink_writes_to_each_plans_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = SessionPlan::secondary();
        plan.output = dir.path().join(&plan.output);

        let mut sink = PngSink::new(RowOrder::AsRead);
        sink.consume(&plan, 0, &striped()).unwrap();

        assert!(dir.path().join("img2.png").exists());
    }

    #[test]
    fn sink_path_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("override.png");
        let plan = SessionPlan::single();

        let mut sink = PngSink::to_path(RowOrder::TopDown, &target);
        assert_eq!(sink.path_for(&plan), target.as_path());
        sink.consume(&plan, 3, &striped()).unwrap();

        assert!(target.exists());
    }
}
