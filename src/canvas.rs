use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::viewport::Point;

/// Coverage at or above this value counts as painted.
pub const COVERAGE_THRESHOLD: u8 = 128;
/// Coverage written by paint operations.
pub const PAINTED: u8 = 255;
/// Coverage written by erase operations.
pub const UNPAINTED: u8 = 0;

// ============================================================================
// LAYER SELECTOR
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Pixels not confidently background.
    #[default]
    Unknown,
    /// Pixels confidently subject. Always a subset of `Unknown`.
    Foreground,
}

impl LayerKind {
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Unknown => "Unknown",
            LayerKind::Foreground => "Foreground",
        }
    }

    pub fn all() -> &'static [LayerKind] {
        &[LayerKind::Unknown, LayerKind::Foreground]
    }
}

/// Result of [`MaskLayerStore::query`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelState {
    pub foreground: bool,
    pub unknown: bool,
}

// ============================================================================
// MASK LAYER – one 8-bit coverage bitmap
// ============================================================================

/// A single coverage bitmap. Values are thresholded at
/// [`COVERAGE_THRESHOLD`] for every logical decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskLayer {
    pixels: GrayImage,
}

impl MaskLayer {
    /// Zero-filled layer. A zero-area layer owns no pixel storage.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
        }
    }

    /// Wrap an existing coverage raster as-is.
    pub fn from_image(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }

    /// Out-of-bounds pixels are never painted.
    pub fn is_painted(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.pixels.get_pixel(x, y)[0] >= COVERAGE_THRESHOLD
    }

    /// Painted state by flat row-major index. Caller guarantees the bound.
    #[inline]
    pub(crate) fn is_painted_at(&self, idx: usize) -> bool {
        self.pixels.as_raw()[idx] >= COVERAGE_THRESHOLD
    }

    #[inline]
    pub(crate) fn set_at(&mut self, idx: usize, value: u8) {
        let raw: &mut [u8] = &mut self.pixels;
        raw[idx] = value;
    }

    pub fn set(&mut self, x: u32, y: u32, painted: bool) {
        if x < self.width() && y < self.height() {
            let value = if painted { PAINTED } else { UNPAINTED };
            self.pixels.put_pixel(x, y, Luma([value]));
        }
    }

    pub fn clear(&mut self) {
        let raw: &mut [u8] = &mut self.pixels;
        raw.fill(UNPAINTED);
    }

    pub fn painted_count(&self) -> usize {
        self.pixels
            .as_raw()
            .iter()
            .filter(|&&v| v >= COVERAGE_THRESHOLD)
            .count()
    }

    /// Write `value` over a filled disc. Pixels whose centre lies within
    /// `radius` of `center` are covered, and the pixel containing `center`
    /// always is, so sub-pixel radii still leave a mark. The disc is clipped
    /// to the layer.
    pub fn stamp_disc(&mut self, center: Point, radius: f32, value: u8) {
        let (width, height) = (self.width(), self.height());
        for_each_disc_pixel(width, height, center, radius, |idx| self.set_at(idx, value));
    }
}

/// Visit the flat index of every pixel covered by a disc, clipped to
/// `width × height`. Each index is visited once.
fn for_each_disc_pixel(width: u32, height: u32, center: Point, radius: f32, mut f: impl FnMut(usize)) {
    if width == 0 || height == 0 || !center.x.is_finite() || !center.y.is_finite() {
        return;
    }
    let r = if radius.is_finite() { radius.max(0.0) } else { 0.0 };

    let min_x = (center.x - r).floor().max(0.0);
    let min_y = (center.y - r).floor().max(0.0);
    let max_x = (center.x + r).ceil().min(width as f32 - 1.0);
    let max_y = (center.y + r).ceil().min(height as f32 - 1.0);
    if min_x > max_x || min_y > max_y {
        return;
    }

    // The containing pixel always lies inside the unclipped bounding box.
    let containing = (center.x >= 0.0 && center.y >= 0.0)
        .then(|| (center.x as u32, center.y as u32))
        .filter(|&(cx, cy)| cx < width && cy < height);

    let r2 = r * r;
    let stride = width as usize;
    for y in min_y as u32..=max_y as u32 {
        let dy = y as f32 + 0.5 - center.y;
        let row = y as usize * stride;
        for x in min_x as u32..=max_x as u32 {
            let dx = x as f32 + 0.5 - center.x;
            if dx * dx + dy * dy <= r2 || containing == Some((x, y)) {
                f(row + x as usize);
            }
        }
    }
}

// ============================================================================
// MASK LAYER STORE – the two coupled layers
// ============================================================================

/// The `unknown` and `foreground` layers of one image. Every mutating call
/// leaves `foreground ⊆ unknown`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskLayerStore {
    width: u32,
    height: u32,
    unknown: MaskLayer,
    foreground: MaskLayer,
}

impl Default for MaskLayerStore {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl MaskLayerStore {
    /// Allocate both layers zero-filled.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            unknown: MaskLayer::new(width, height),
            foreground: MaskLayer::new(width, height),
        }
    }

    /// Build from two rasters. Returns `None` when their sizes differ.
    /// Foreground coverage is unioned into unknown.
    pub fn from_layers(unknown: MaskLayer, foreground: MaskLayer) -> Option<Self> {
        if unknown.width() != foreground.width() || unknown.height() != foreground.height() {
            return None;
        }
        let mut store = Self {
            width: unknown.width(),
            height: unknown.height(),
            unknown,
            foreground,
        };
        store.restore_containment();
        Some(store)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn layer(&self, kind: LayerKind) -> &MaskLayer {
        match kind {
            LayerKind::Unknown => &self.unknown,
            LayerKind::Foreground => &self.foreground,
        }
    }

    pub fn unknown(&self) -> &MaskLayer {
        &self.unknown
    }

    pub fn foreground(&self) -> &MaskLayer {
        &self.foreground
    }

    /// Zero both layers in place.
    pub fn clear(&mut self) {
        self.unknown.clear();
        self.foreground.clear();
    }

    /// Stamp a painted disc. Foreground paint also paints unknown.
    pub fn paint(&mut self, layer: LayerKind, point: Point, radius: f32) {
        if self.is_empty() {
            return;
        }
        let Self { width, height, unknown, foreground } = self;
        let with_foreground = layer == LayerKind::Foreground;
        for_each_disc_pixel(*width, *height, point, radius, |idx| {
            unknown.set_at(idx, PAINTED);
            if with_foreground {
                foreground.set_at(idx, PAINTED);
            }
        });
    }

    /// Clear a disc. Erasing unknown also erases foreground; erasing
    /// foreground leaves the pixels unknown.
    pub fn erase(&mut self, layer: LayerKind, point: Point, radius: f32) {
        if self.is_empty() {
            return;
        }
        let Self { width, height, unknown, foreground } = self;
        let with_unknown = layer == LayerKind::Unknown;
        for_each_disc_pixel(*width, *height, point, radius, |idx| {
            foreground.set_at(idx, UNPAINTED);
            if with_unknown {
                unknown.set_at(idx, UNPAINTED);
            }
        });
    }

    /// Mark a set of flat pixel indices painted on `layer`, keeping
    /// containment. Indices out of range are skipped.
    pub(crate) fn paint_indices(&mut self, layer: LayerKind, indices: &[usize]) {
        let len = self.width as usize * self.height as usize;
        for &idx in indices.iter().filter(|&&i| i < len) {
            self.unknown.set_at(idx, PAINTED);
            if layer == LayerKind::Foreground {
                self.foreground.set_at(idx, PAINTED);
            }
        }
    }

    /// Painted state at an image-space point. Out-of-bounds points read as
    /// unpainted.
    pub fn query(&self, point: Point) -> PixelState {
        if point.x < 0.0 || point.y < 0.0 || !point.x.is_finite() || !point.y.is_finite() {
            return PixelState::default();
        }
        self.query_pixel(point.x as u32, point.y as u32)
    }

    pub fn query_pixel(&self, x: u32, y: u32) -> PixelState {
        PixelState {
            foreground: self.foreground.is_painted(x, y),
            unknown: self.unknown.is_painted(x, y),
        }
    }

    /// True when every painted foreground pixel is painted unknown.
    pub fn satisfies_containment(&self) -> bool {
        let len = self.width as usize * self.height as usize;
        (0..len).all(|i| !self.foreground.is_painted_at(i) || self.unknown.is_painted_at(i))
    }

    fn restore_containment(&mut self) {
        let len = self.width as usize * self.height as usize;
        for i in 0..len {
            if self.foreground.is_painted_at(i) && !self.unknown.is_painted_at(i) {
                self.unknown.set_at(i, PAINTED);
            }
        }
    }

    /// Bytes held by both layers.
    pub fn memory_bytes(&self) -> usize {
        self.unknown.as_image().as_raw().len() + self.foreground.as_image().as_raw().len()
    }
}
