//! Renders the editor views into a viewport-sized RGBA frame.
//!
//! All three views are pure functions of the image, the masks, the view
//! transform and [`ViewOptions`]. Sampling is nearest-neighbour so mask
//! boundaries stay crisp at any zoom. The compositor keeps only its frame
//! buffer between calls.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::canvas::{LayerKind, MaskLayerStore};
use crate::codec;
use crate::settings::{Checkerboard, Tint};
use crate::viewport::{CoordinateMapper, Point};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    /// Image with tinted mask overlays.
    #[default]
    Normal,
    /// The encoded 0/128/255 raster.
    Trimap,
    /// Image clipped to the active layer over a checkerboard.
    Cutout,
}

/// Everything besides pixels that affects a rendered frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewOptions {
    pub mode: ViewMode,
    pub show_image: bool,
    pub show_unknown: bool,
    pub show_foreground: bool,
    pub unknown_tint: Tint,
    pub foreground_tint: Tint,
    /// Layer the cutout view clips to.
    pub active_layer: LayerKind,
    /// Cutout shows the complement of the active layer.
    pub invert: bool,
    pub checkerboard: Checkerboard,
    pub background: [u8; 4],
}

impl Default for ViewOptions {
    fn default() -> Self {
        let settings = crate::settings::EditorSettings::default();
        Self {
            mode: ViewMode::Normal,
            show_image: true,
            show_unknown: true,
            show_foreground: true,
            unknown_tint: settings.unknown_tint,
            foreground_tint: settings.foreground_tint,
            active_layer: LayerKind::Unknown,
            invert: false,
            checkerboard: settings.checkerboard,
            background: settings.background,
        }
    }
}

#[derive(Default)]
pub struct ViewCompositor {
    frame: RgbaImage,
}

impl ViewCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last rendered frame.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Render one frame at the mapper's viewport size. Viewport pixels
    /// outside the image extent get `options.background`.
    pub fn render(
        &mut self,
        image: Option<&RgbaImage>,
        masks: &MaskLayerStore,
        mapper: &CoordinateMapper,
        options: &ViewOptions,
    ) -> &RgbaImage {
        let viewport = mapper.viewport();
        let fw = viewport.w.max(0.0).round() as u32;
        let fh = viewport.h.max(0.0).round() as u32;
        if self.frame.dimensions() != (fw, fh) {
            self.frame = RgbaImage::new(fw, fh);
        }
        let background = Rgba(options.background);
        for px in self.frame.pixels_mut() {
            *px = background;
        }
        if masks.is_empty() || fw == 0 || fh == 0 {
            return &self.frame;
        }

        // Visible span of the image extent in viewport pixels.
        let (origin, extent) = mapper.image_rect();
        let x0 = origin.x.floor().max(0.0) as u32;
        let y0 = origin.y.floor().max(0.0) as u32;
        let x1 = ((origin.x + extent.w).ceil().max(0.0) as u32).min(fw);
        let y1 = ((origin.y + extent.h).ceil().max(0.0) as u32).min(fh);

        let (mw, mh) = (masks.width(), masks.height());
        for vy in y0..y1 {
            for vx in x0..x1 {
                let p = mapper.to_image_space(Point::new(vx as f32 + 0.5, vy as f32 + 0.5));
                if p.x < 0.0 || p.y < 0.0 {
                    continue;
                }
                let (ix, iy) = (p.x as u32, p.y as u32);
                if ix >= mw || iy >= mh {
                    continue;
                }
                let color = match options.mode {
                    ViewMode::Normal => normal_pixel(image, masks, ix, iy, options),
                    ViewMode::Trimap => {
                        let v = codec::trimap_value(masks.query_pixel(ix, iy));
                        Rgba([v, v, v, 255])
                    }
                    ViewMode::Cutout => cutout_pixel(image, masks, ix, iy, vx, vy, options),
                };
                self.frame.put_pixel(vx, vy, color);
            }
        }
        &self.frame
    }
}

fn source_pixel(image: Option<&RgbaImage>, x: u32, y: u32) -> Option<Rgba<u8>> {
    image
        .filter(|img| x < img.width() && y < img.height())
        .map(|img| *img.get_pixel(x, y))
}

fn normal_pixel(
    image: Option<&RgbaImage>,
    masks: &MaskLayerStore,
    x: u32,
    y: u32,
    options: &ViewOptions,
) -> Rgba<u8> {
    let mut dst = Rgba(options.background);
    if options.show_image
        && let Some(src) = source_pixel(image, x, y)
    {
        dst = blend(dst, [src[0], src[1], src[2]], src[3] as f32 / 255.0);
    }
    let px = masks.query_pixel(x, y);
    if options.show_unknown && px.unknown {
        dst = blend(dst, options.unknown_tint.color, options.unknown_tint.opacity);
    }
    if options.show_foreground && px.foreground {
        dst = blend(dst, options.foreground_tint.color, options.foreground_tint.opacity);
    }
    dst
}

fn cutout_pixel(
    image: Option<&RgbaImage>,
    masks: &MaskLayerStore,
    x: u32,
    y: u32,
    vx: u32,
    vy: u32,
    options: &ViewOptions,
) -> Rgba<u8> {
    let checker = options.checkerboard;
    let cell = checker.cell.max(1);
    let light = ((vx / cell) + (vy / cell)) % 2 == 0;
    let base = if light { checker.light } else { checker.dark };
    let mut dst = Rgba([base[0], base[1], base[2], 255]);

    let inside = masks.layer(options.active_layer).is_painted(x, y) != options.invert;
    if inside && let Some(src) = source_pixel(image, x, y) {
        dst = blend(dst, [src[0], src[1], src[2]], src[3] as f32 / 255.0);
    }
    dst
}

/// Source-over of an opaque colour at `alpha` onto `dst`.
fn blend(dst: Rgba<u8>, color: [u8; 3], alpha: f32) -> Rgba<u8> {
    let a = alpha.clamp(0.0, 1.0);
    let mix = |d: u8, s: u8| (d as f32 * (1.0 - a) + s as f32 * a).round() as u8;
    Rgba([
        mix(dst[0], color[0]),
        mix(dst[1], color[1]),
        mix(dst[2], color[2]),
        dst[3].max((a * 255.0).round() as u8),
    ])
}

// ============================================================================
// REDRAW SCHEDULER
// ============================================================================

/// Coalesces redraw requests: any number of `request` calls between two
/// frames yield a single `take() == true`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RedrawScheduler {
    pending: bool,
}

impl RedrawScheduler {
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}
