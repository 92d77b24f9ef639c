//! Packed-RGB canvas with bounds-checked write and blend.
//!
//! Logical coordinates address `width × height` pixels; each logical pixel covers a
//! `scale × scale` block of cells, so the grid holds `width·scale × height·scale` cells stored
//! row-major.

use crate::core::{PackedRgb, PixelUpdate, pack_rgb, unpack_rgb};
use crate::error::{VloedError, VloedResult};

/// How non-opaque pixels are combined with the cell underneath.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaBlend {
    /// `new = c·a + old·(1 - a)` with `a` taken as the raw 0..=255 byte, on the single unscaled
    /// cell `(x, y)`. Only `a = 0` (keep) and `a = 1` (replace) are meaningful; larger values
    /// overflow and wrap across channels. Kept as the wire-compatible default.
    #[default]
    Literal,
    /// `new = (c·a + old·(255 - a)) / 255`, applied to the whole scaled block.
    Normalized,
}

#[derive(Clone, Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    scale: u32,
    blend: AlphaBlend,
    cells: Vec<PackedRgb>,
}

impl FrameBuffer {
    /// Allocate a black canvas of `width × height` logical pixels.
    pub fn new(width: u32, height: u32, scale: u32) -> VloedResult<Self> {
        if width == 0 || height == 0 {
            return Err(VloedError::validation(
                "frame buffer width/height must be non-zero",
            ));
        }
        if scale == 0 {
            return Err(VloedError::validation("frame buffer scale must be non-zero"));
        }
        let cells_w = width
            .checked_mul(scale)
            .ok_or_else(|| VloedError::validation("scaled frame buffer width overflows u32"))?;
        let cells_h = height
            .checked_mul(scale)
            .ok_or_else(|| VloedError::validation("scaled frame buffer height overflows u32"))?;
        let len = (cells_w as usize)
            .checked_mul(cells_h as usize)
            .ok_or_else(|| VloedError::validation("frame buffer is too large"))?;
        Ok(Self {
            width,
            height,
            scale,
            blend: AlphaBlend::default(),
            cells: vec![0; len],
        })
    }

    pub fn with_blend(mut self, blend: AlphaBlend) -> Self {
        self.blend = blend;
        self
    }

    /// Logical width (what clients address and what the beacon advertises).
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn blend(&self) -> AlphaBlend {
        self.blend
    }

    pub fn cells_width(&self) -> u32 {
        self.width * self.scale
    }

    pub fn cells_height(&self) -> u32 {
        self.height * self.scale
    }

    /// Cell value at physical coordinates, `None` when out of range.
    pub fn cell(&self, cx: u32, cy: u32) -> Option<PackedRgb> {
        self.index(cx, cy).map(|i| self.cells[i])
    }

    pub fn fill(&mut self, color: PackedRgb) {
        self.cells.fill(color & 0x00FF_FFFF);
    }

    /// Read-only borrow handed to a display sink while presenting.
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.cells_width(),
            height: self.cells_height(),
            scale: self.scale,
            cells: &self.cells,
        }
    }

    pub fn apply(&mut self, p: PixelUpdate) {
        self.write(u32::from(p.x), u32::from(p.y), p.r, p.g, p.b, p.a);
    }

    /// Paint one logical pixel. Out-of-range coordinates are ignored.
    pub fn write(&mut self, x: u32, y: u32, r: u8, g: u8, b: u8, a: u8) {
        if a == u8::MAX {
            self.fill_block(x, y, pack_rgb(r, g, b));
            return;
        }
        match self.blend {
            AlphaBlend::Literal => self.blend_literal(x, y, r, g, b, a),
            AlphaBlend::Normalized => self.blend_normalized(x, y, r, g, b, a),
        }
    }

    fn index(&self, cx: u32, cy: u32) -> Option<usize> {
        if cx >= self.cells_width() || cy >= self.cells_height() {
            return None;
        }
        Some(cy as usize * self.cells_width() as usize + cx as usize)
    }

    fn fill_block(&mut self, x: u32, y: u32, color: PackedRgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let s = self.scale;
        let stride = self.cells_width() as usize;
        let x0 = (x * s) as usize;
        for row in (y * s)..(y * s + s) {
            let start = row as usize * stride + x0;
            self.cells[start..start + s as usize].fill(color);
        }
    }

    fn blend_literal(&mut self, x: u32, y: u32, r: u8, g: u8, b: u8, a: u8) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let (or, og, ob) = unpack_rgb(self.cells[i]);
        let a = f64::from(a);
        let mix = |c: u8, old: u8| f64::from(c) * a + f64::from(old) * (1.0 - a);
        let packed = mix(r, or) * 65536.0 + mix(g, og) * 256.0 + mix(b, ob);
        self.cells[i] = (packed as i64 as u32) & 0x00FF_FFFF;
    }

    fn blend_normalized(&mut self, x: u32, y: u32, r: u8, g: u8, b: u8, a: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let Some(i) = self.index(x * self.scale, y * self.scale) else {
            return;
        };
        let (or, og, ob) = unpack_rgb(self.cells[i]);
        let a = u16::from(a);
        let color = pack_rgb(
            mix_div255(r, or, a),
            mix_div255(g, og, a),
            mix_div255(b, ob, a),
        );
        self.fill_block(x, y, color);
    }
}

fn mix_div255(c: u8, old: u8, a: u16) -> u8 {
    let v = u32::from(c) * u32::from(a) + u32::from(old) * u32::from(255 - a);
    ((v + 127) / 255) as u8
}

/// Borrowed, read-only view of the cell grid.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    pub scale: u32,
    /// Row-major packed `0x00RRGGBB`.
    pub cells: &'a [PackedRgb],
}

impl FrameView<'_> {
    pub fn get(&self, cx: u32, cy: u32) -> Option<PackedRgb> {
        if cx >= self.width || cy >= self.height {
            return None;
        }
        self.cells
            .get(cy as usize * self.width as usize + cx as usize)
            .copied()
    }

    /// Expand to straight RGBA8 (alpha always 255), row-major.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.cells.len() * 4);
        for &c in self.cells {
            let (r, g, b) = unpack_rgb(c);
            out.extend_from_slice(&[r, g, b, u8::MAX]);
        }
        out
    }
}
