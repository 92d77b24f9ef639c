use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::core::SERVER_VERSION;
use crate::error::{VloedError, VloedResult};
use crate::framebuffer::FrameView;

/// Title for a window showing the canvas, e.g. `PixelVloed 0.40 127.0.0.1:5005`.
pub fn window_title(extra: Option<&str>) -> String {
    let mut title = format!("PixelVloed {SERVER_VERSION:.2}");
    if let Some(extra) = extra {
        title.push(' ');
        title.push_str(extra);
    }
    title
}

/// Where finished frames go.
///
/// `present` receives a read-only view and may block until the frame is shown; the pacer does
/// not touch the frame buffer until it returns.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: FrameView<'_>) -> VloedResult<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn present(&mut self, frame: FrameView<'_>) -> VloedResult<()> {
        (**self).present(frame)
    }
}

/// Headless sink that only counts presents.
#[derive(Debug, Default)]
pub struct NullSink {
    presented: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySink for NullSink {
    fn present(&mut self, _frame: FrameView<'_>) -> VloedResult<()> {
        self.presented += 1;
        Ok(())
    }
}

/// Owned copy of a presented frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresentedFrame {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<u32>,
}

impl PresentedFrame {
    pub fn cell(&self, cx: u32, cy: u32) -> Option<u32> {
        if cx >= self.width || cy >= self.height {
            return None;
        }
        self.cells
            .get(cy as usize * self.width as usize + cx as usize)
            .copied()
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    /// Frames in presentation order.
    pub(crate) frames: Vec<PresentedFrame>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[PresentedFrame] {
        &self.frames
    }

    pub fn last(&self) -> Option<&PresentedFrame> {
        self.frames.last()
    }
}

impl DisplaySink for InMemorySink {
    fn present(&mut self, frame: FrameView<'_>) -> VloedResult<()> {
        self.frames.push(PresentedFrame {
            width: frame.width,
            height: frame.height,
            cells: frame.cells.to_vec(),
        });
        Ok(())
    }
}

/// Writes the canvas to a PNG file, at most once per `min_interval`.
#[derive(Debug)]
pub struct PngSnapshotSink {
    out_path: PathBuf,
    min_interval: Duration,
    last_write: Option<Instant>,
    scratch: Vec<u8>,
}

impl PngSnapshotSink {
    pub fn new(out_path: impl Into<PathBuf>, min_interval: Duration) -> Self {
        Self {
            out_path: out_path.into(),
            min_interval,
            last_write: None,
            scratch: Vec::new(),
        }
    }

    pub fn out_path(&self) -> &Path {
        &self.out_path
    }

    fn write_png(&mut self, frame: FrameView<'_>) -> VloedResult<()> {
        if let Some(parent) = self.out_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create snapshot dir '{}'", parent.display()))?;
        }

        self.scratch.clear();
        self.scratch.reserve(frame.cells.len() * 3);
        for &c in frame.cells {
            self.scratch
                .extend_from_slice(&[(c >> 16) as u8, (c >> 8) as u8, c as u8]);
        }

        image::save_buffer_with_format(
            &self.out_path,
            &self.scratch,
            frame.width,
            frame.height,
            image::ColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .map_err(|e| {
            VloedError::sink(format!(
                "write png '{}': {e}",
                self.out_path.display()
            ))
        })
    }
}

impl DisplaySink for PngSnapshotSink {
    fn present(&mut self, frame: FrameView<'_>) -> VloedResult<()> {
        let now = Instant::now();
        if let Some(last) = self.last_write
            && now.duration_since(last) < self.min_interval
        {
            return Ok(());
        }
        self.last_write = Some(now);
        self.write_png(frame)
    }
}
