//! View-space <-> image-space mapping.
//!
//! The mapping is the affine transform `view = pan + zoom * image`, where
//! `view` is measured in viewport pixels from the top-left corner of the
//! drawing area and `image` in image pixels. `zoom` is bounded below by the
//! contain-fit scale and above by [`MAX_ZOOM`]; `pan` is bounded so the image
//! can overscroll by at most half a viewport on each axis.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Upper zoom bound (image pixel = 20 view pixels).
pub const MAX_ZOOM: f32 = 20.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation, `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub const ZERO: Size = Size { w: 0.0, h: 0.0 };

    pub const fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }

    pub fn is_empty(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }
}

/// Owns zoom and pan for one editor view.
#[derive(Clone, Debug)]
pub struct CoordinateMapper {
    zoom: f32,
    pan: Point,
    viewport: Size,
    image: Size,
    max_zoom: f32,
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::new(MAX_ZOOM)
    }
}

impl CoordinateMapper {
    pub fn new(max_zoom: f32) -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ZERO,
            viewport: Size::ZERO,
            image: Size::ZERO,
            max_zoom: if max_zoom > 0.0 { max_zoom } else { MAX_ZOOM },
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn image_size(&self) -> Size {
        self.image
    }

    /// Replace the image extent and reset the view to contain-fit.
    pub fn set_image(&mut self, image: Size) {
        self.image = image;
        self.fit_to_contain();
    }

    /// Resize the viewport. Zoom is raised to the new fit scale if needed and
    /// pan is re-clamped; the view is not otherwise reset.
    pub fn set_viewport(&mut self, viewport: Size) {
        if self.viewport == viewport {
            return;
        }
        let first_layout = self.viewport.is_empty();
        self.viewport = viewport;
        if first_layout {
            self.fit_to_contain();
        } else {
            self.zoom = self.zoom.clamp(self.min_zoom(), self.max_zoom());
            self.clamp_pan();
        }
    }

    /// The contain-fit scale. `1.0` when either extent is empty.
    pub fn fit_zoom(&self) -> f32 {
        if self.image.is_empty() || self.viewport.is_empty() {
            return 1.0;
        }
        (self.viewport.w / self.image.w).min(self.viewport.h / self.image.h)
    }

    pub fn min_zoom(&self) -> f32 {
        self.fit_zoom()
    }

    /// Never below the fit scale, so tiny images in large viewports keep a
    /// valid range.
    pub fn max_zoom(&self) -> f32 {
        self.max_zoom.max(self.fit_zoom())
    }

    pub fn fit_to_contain(&mut self) {
        self.zoom = self.fit_zoom();
        self.pan = Point::new(
            (self.viewport.w - self.image.w * self.zoom) / 2.0,
            (self.viewport.h - self.image.h * self.zoom) / 2.0,
        );
        self.clamp_pan();
    }

    pub fn to_image_space(&self, view: Point) -> Point {
        Point::new(
            (view.x - self.pan.x) / self.zoom,
            (view.y - self.pan.y) / self.zoom,
        )
    }

    pub fn to_view_space(&self, image: Point) -> Point {
        Point::new(
            self.pan.x + image.x * self.zoom,
            self.pan.y + image.y * self.zoom,
        )
    }

    /// Converts a length in view pixels to image pixels at the current zoom.
    pub fn view_len_to_image(&self, len: f32) -> f32 {
        len / self.zoom
    }

    /// Zoom to `requested` while keeping the image point under `anchor` fixed.
    pub fn zoom_at(&mut self, anchor: Point, requested: f32) {
        if !requested.is_finite() {
            return;
        }
        let fixed = self.to_image_space(anchor);
        self.zoom = requested.clamp(self.min_zoom(), self.max_zoom());
        self.pan = Point::new(
            anchor.x - fixed.x * self.zoom,
            anchor.y - fixed.y * self.zoom,
        );
        self.clamp_pan();
    }

    /// Multiply zoom by `factor` around the viewport centre.
    pub fn zoom_by(&mut self, factor: f32) {
        let center = Point::new(self.viewport.w / 2.0, self.viewport.h / 2.0);
        self.zoom_at(center, self.zoom * factor);
    }

    pub fn pan_by(&mut self, delta: Point) {
        self.pan = self.pan + delta;
        self.clamp_pan();
    }

    /// Each axis stays in `[viewport/2 - extent, viewport/2]`.
    pub fn clamp_pan(&mut self) {
        let extent_w = self.image.w * self.zoom;
        let extent_h = self.image.h * self.zoom;
        let half_w = self.viewport.w / 2.0;
        let half_h = self.viewport.h / 2.0;
        self.pan.x = self.pan.x.clamp(half_w - extent_w, half_w);
        self.pan.y = self.pan.y.clamp(half_h - extent_h, half_h);
    }

    /// Top-left corner and size of the image in view space.
    pub fn image_rect(&self) -> (Point, Size) {
        (
            self.pan,
            Size::new(self.image.w * self.zoom, self.image.h * self.zoom),
        )
    }
}
