//! One editing session: the single owner of the image reference, the mask
//! layers, history, view transform and tool state.
//!
//! The host drives it with pointer events and commands and pulls the encoded
//! trimap back out with [`EditorSession::export`]. Nothing here is shared
//! across threads; a multi-threaded host wraps the whole session in its own
//! lock.

use std::sync::Arc;
use std::time::Instant;

use image::{GrayImage, RgbaImage};

use crate::canvas::{LayerKind, MaskLayerStore, PixelState};
use crate::codec;
use crate::components::history::HistoryManager;
use crate::components::tools::{
    BrushSizes, StrokeMachine, StrokeParams, StrokeRasterizer, StrokeState, Tool,
};
use crate::compositor::{RedrawScheduler, ViewCompositor, ViewMode, ViewOptions};
use crate::ops::fill::{FillResult, flood_fill};
use crate::settings::{EditorSettings, Tint};
use crate::viewport::{CoordinateMapper, Point, Size};

/// The value handed back to the host.
#[derive(Clone, Debug, PartialEq)]
pub struct TrimapExport {
    pub width: u32,
    pub height: u32,
    pub trimap: GrayImage,
    /// At least one committed edit is reachable by undo.
    pub has_edits: bool,
}

pub struct EditorSession {
    settings: EditorSettings,
    image: Option<Arc<RgbaImage>>,
    masks: MaskLayerStore,
    history: HistoryManager,
    mapper: CoordinateMapper,
    stroke: StrokeMachine,
    compositor: ViewCompositor,
    redraw: RedrawScheduler,

    tool: Tool,
    /// Tool to restore when the pan toggle is switched off.
    tool_before_pan: Option<Tool>,
    layer: LayerKind,
    brushes: BrushSizes,
    view: ViewOptions,
    /// Last pointer position while dragging with the pan tool.
    pan_anchor: Option<Point>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl EditorSession {
    pub fn new(settings: EditorSettings) -> Self {
        let settings = settings.sanitized();
        let view = ViewOptions {
            unknown_tint: settings.unknown_tint,
            foreground_tint: settings.foreground_tint,
            checkerboard: settings.checkerboard,
            background: settings.background,
            ..ViewOptions::default()
        };
        Self {
            history: HistoryManager::new(settings.history_limit),
            mapper: CoordinateMapper::new(settings.max_zoom),
            stroke: StrokeMachine::new(
                settings.dot_delay(),
                StrokeRasterizer::new(settings.stroke_spacing),
            ),
            brushes: settings.brushes,
            compositor: ViewCompositor::new(),
            redraw: RedrawScheduler::default(),
            image: None,
            masks: MaskLayerStore::default(),
            tool: Tool::Brush,
            tool_before_pan: None,
            layer: LayerKind::Unknown,
            view,
            pan_anchor: None,
            settings,
        }
    }

    // ---- image lifecycle ----------------------------------------------------

    /// Start editing `image`. A seed raster of the same size initialises the
    /// masks; a missing or mismatched seed starts them blank. History is
    /// reset and the view fits the image.
    pub fn load_image(&mut self, image: Arc<RgbaImage>, seed: Option<&GrayImage>) {
        let (w, h) = image.dimensions();
        let masks = match seed {
            Some(raster) if raster.dimensions() == (w, h) => codec::decode(raster),
            Some(raster) => {
                log::warn!(
                    "seed trimap is {}x{} but image is {w}x{h}; starting blank",
                    raster.width(),
                    raster.height()
                );
                MaskLayerStore::new(w, h)
            }
            None => MaskLayerStore::new(w, h),
        };
        self.load_image_with_masks(image, masks);
    }

    /// Start editing `image` with already decoded masks. Masks of the wrong
    /// size are replaced by blank ones.
    pub fn load_image_with_masks(&mut self, image: Arc<RgbaImage>, masks: MaskLayerStore) {
        let (w, h) = image.dimensions();
        self.masks = if (masks.width(), masks.height()) == (w, h) {
            masks
        } else {
            log::warn!(
                "masks are {}x{} but image is {w}x{h}; starting blank",
                masks.width(),
                masks.height()
            );
            MaskLayerStore::new(w, h)
        };
        log::info!(
            "editing {w}x{h} image, {} unknown px seeded",
            self.masks.unknown().painted_count()
        );
        self.image = Some(image);
        self.history.clear();
        self.stroke.reset();
        self.pan_anchor = None;
        self.mapper.set_image(Size::new(w as f32, h as f32));
        self.redraw.request();
    }

    /// Drop the image, masks and history.
    pub fn remove_image(&mut self) {
        self.image = None;
        self.masks = MaskLayerStore::default();
        self.history.clear();
        self.stroke.reset();
        self.pan_anchor = None;
        self.view.mode = ViewMode::Normal;
        self.view.invert = false;
        self.mapper.set_image(Size::ZERO);
        self.redraw.request();
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }

    // ---- read-only accessors --------------------------------------------

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn masks(&self) -> &MaskLayerStore {
        &self.masks
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    /// Radius of the current tool in view pixels, for cursor rendering.
    pub fn brush_radius(&self) -> Option<f32> {
        self.brushes.radius(self.tool)
    }

    pub fn brushes(&self) -> &BrushSizes {
        &self.brushes
    }

    pub fn view_options(&self) -> &ViewOptions {
        &self.view
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view.mode
    }

    pub fn zoom(&self) -> f32 {
        self.mapper.zoom()
    }

    pub fn query(&self, image_point: Point) -> PixelState {
        self.masks.query(image_point)
    }

    // ---- tool & layer state ---------------------------------------------

    pub fn set_tool(&mut self, tool: Tool) {
        if tool != self.tool {
            self.finish_pointer_interaction();
        }
        self.tool = tool;
        if tool != Tool::Pan {
            self.tool_before_pan = None;
        }
    }

    /// Pan on: remember the current tool. Pan off: restore it.
    pub fn toggle_pan_tool(&mut self) {
        if self.tool == Tool::Pan {
            let previous = self.tool_before_pan.take().unwrap_or(Tool::Brush);
            self.set_tool(previous);
        } else {
            let previous = self.tool;
            self.set_tool(Tool::Pan);
            self.tool_before_pan = Some(previous);
        }
    }

    pub fn set_layer(&mut self, layer: LayerKind) {
        if self.layer != layer {
            self.layer = layer;
            self.view.active_layer = layer;
            if self.view.mode == ViewMode::Cutout {
                self.redraw.request();
            }
        }
    }

    pub fn set_brush_radius(&mut self, radius: f32) {
        self.brushes.set_radius(self.tool, radius);
    }

    pub fn grow_brush(&mut self) {
        self.brushes.adjust(self.tool, 1.0);
    }

    pub fn shrink_brush(&mut self) {
        self.brushes.adjust(self.tool, -1.0);
    }

    // ---- view state -----------------------------------------------------

    /// Cutout needs an image; without one the request is ignored.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.view.mode == mode || (mode == ViewMode::Cutout && !self.has_image()) {
            return;
        }
        if mode != ViewMode::Cutout {
            self.view.invert = false;
        }
        self.view.mode = mode;
        self.redraw.request();
    }

    pub fn toggle_trimap_view(&mut self) {
        let next = if self.view.mode == ViewMode::Trimap {
            ViewMode::Normal
        } else {
            ViewMode::Trimap
        };
        self.set_view_mode(next);
    }

    pub fn toggle_cutout(&mut self) {
        let next = if self.view.mode == ViewMode::Cutout {
            ViewMode::Normal
        } else {
            ViewMode::Cutout
        };
        self.set_view_mode(next);
    }

    /// Only meaningful in cutout mode; ignored otherwise.
    pub fn toggle_invert(&mut self) {
        if self.view.mode == ViewMode::Cutout {
            self.view.invert = !self.view.invert;
            self.redraw.request();
        }
    }

    pub fn toggle_image_visibility(&mut self) {
        self.view.show_image = !self.view.show_image;
        self.redraw.request();
    }

    pub fn toggle_layer_visibility(&mut self, layer: LayerKind) {
        match layer {
            LayerKind::Unknown => self.view.show_unknown = !self.view.show_unknown,
            LayerKind::Foreground => self.view.show_foreground = !self.view.show_foreground,
        }
        self.redraw.request();
    }

    pub fn set_tint(&mut self, layer: LayerKind, tint: Tint) {
        let tint = Tint::new(tint.color, tint.opacity.clamp(0.0, 1.0));
        match layer {
            LayerKind::Unknown => self.view.unknown_tint = tint,
            LayerKind::Foreground => self.view.foreground_tint = tint,
        }
        self.redraw.request();
    }

    pub fn set_viewport(&mut self, size: Size) {
        if self.mapper.viewport() != size {
            self.mapper.set_viewport(size);
            self.redraw.request();
        }
    }

    pub fn fit_view(&mut self) {
        self.mapper.fit_to_contain();
        self.redraw.request();
    }

    pub fn zoom_in(&mut self) {
        self.mapper.zoom_by(self.settings.zoom_step);
        self.redraw.request();
    }

    pub fn zoom_out(&mut self) {
        self.mapper.zoom_by(1.0 / self.settings.zoom_step);
        self.redraw.request();
    }

    /// Wheel zoom: multiply by `factor` keeping `anchor` (view space) fixed.
    pub fn zoom_at(&mut self, anchor: Point, factor: f32) {
        self.mapper.zoom_at(anchor, self.mapper.zoom() * factor);
        self.redraw.request();
    }

    pub fn pan_by(&mut self, delta: Point) {
        self.mapper.pan_by(delta);
        self.redraw.request();
    }

    // ---- pointer events -------------------------------------------------

    pub fn pointer_down(&mut self, view_point: Point, now: Instant) {
        if !self.has_image() {
            return;
        }
        // A press while still drawing means the last release never arrived.
        self.finish_pointer_interaction();
        let at = self.mapper.to_image_space(view_point);
        match self.tool {
            Tool::Brush | Tool::Eraser => {
                let (Some(op), Some(radius)) = (self.tool.stroke_op(), self.brush_radius()) else {
                    return;
                };
                self.ensure_baseline();
                let params = StrokeParams {
                    layer: self.layer,
                    op,
                    radius: self.mapper.view_len_to_image(radius),
                };
                self.stroke.begin(at, params, now);
            }
            Tool::Bucket => {
                self.fill(self.layer, at);
            }
            Tool::Pan => {
                self.pan_anchor = Some(view_point);
            }
        }
    }

    pub fn pointer_move(&mut self, view_point: Point, now: Instant) {
        if let Some(last) = self.pan_anchor {
            self.pan_by(view_point - last);
            self.pan_anchor = Some(view_point);
            return;
        }
        let at = self.mapper.to_image_space(view_point);
        let outcome = self.stroke.extend(&mut self.masks, at);
        if outcome.changed {
            self.redraw.request();
        }
        // A held click whose deadline passed between events.
        self.tick(now);
    }

    pub fn pointer_up(&mut self, now: Instant) {
        self.pan_anchor = None;
        self.tick(now);
        let outcome = self.stroke.end();
        if outcome.committed {
            self.commit("Stroke");
        }
    }

    /// Double-click: discard any pending dot and reset the view to fit.
    pub fn double_click(&mut self) {
        if self.stroke.cancel_pending() {
            log::debug!("double-click cancelled pending dot");
        }
        self.fit_view();
    }

    /// Advance the pending-dot timer. Call once per host frame.
    pub fn tick(&mut self, now: Instant) {
        let outcome = self.stroke.tick(&mut self.masks, now);
        if outcome.changed {
            self.redraw.request();
        }
        if outcome.committed {
            self.commit("Stroke");
        }
    }

    /// When the host must call [`tick`](Self::tick) next, if a dot is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.stroke.pending_deadline()
    }

    // ---- committed edits ------------------------------------------------

    /// Bucket-fill `layer` from an image-space point. A no-op fill is not
    /// recorded.
    pub fn fill(&mut self, layer: LayerKind, image_point: Point) -> FillResult {
        if !self.has_image() {
            return FillResult::default();
        }
        self.ensure_baseline();
        let result = flood_fill(&mut self.masks, layer, image_point);
        if !result.is_noop() {
            self.commit("Fill");
        }
        result
    }

    pub fn clear(&mut self) {
        if !self.has_image() {
            return;
        }
        self.stroke.reset();
        self.ensure_baseline();
        self.masks.clear();
        log::info!("masks cleared");
        self.commit("Clear");
    }

    pub fn undo(&mut self) -> Option<&'static str> {
        self.stroke.reset();
        let label = self.history.undo(&mut self.masks);
        if label.is_some() {
            self.redraw.request();
        }
        label
    }

    pub fn redo(&mut self) -> Option<&'static str> {
        self.stroke.reset();
        let label = self.history.redo(&mut self.masks);
        if label.is_some() {
            self.redraw.request();
        }
        label
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn has_edits(&self) -> bool {
        self.history.can_undo()
    }

    // ---- outputs --------------------------------------------------------

    /// The encoded trimap, or `None` without an image.
    pub fn export(&self) -> Option<TrimapExport> {
        let (width, height) = self.image_size()?;
        Some(TrimapExport {
            width,
            height,
            trimap: codec::encode(&self.masks),
            has_edits: self.has_edits(),
        })
    }

    /// True at most once per batch of changes.
    pub fn take_redraw(&mut self) -> bool {
        self.redraw.take()
    }

    pub fn request_redraw(&mut self) {
        self.redraw.request();
    }

    /// Render the current view into the compositor's frame.
    pub fn render(&mut self) -> &RgbaImage {
        let image = self.image.as_deref();
        self.compositor
            .render(image, &self.masks, &self.mapper, &self.view)
    }

    // ---- internals ------------------------------------------------------

    /// The first edit after a load records the loaded state first.
    fn ensure_baseline(&mut self) {
        if self.history.is_empty() {
            self.history.snapshot("Initial", &self.masks);
        }
    }

    fn commit(&mut self, label: &'static str) {
        self.history.snapshot(label, &self.masks);
        self.redraw.request();
    }

    /// Close out a drag before the tool changes under it or a new press
    /// arrives without a release.
    fn finish_pointer_interaction(&mut self) {
        self.pan_anchor = None;
        if matches!(self.stroke.state(), StrokeState::Drawing { .. }) {
            self.stroke.reset();
            self.commit("Stroke");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn session(w: u32, h: u32) -> EditorSession {
        let mut s = EditorSession::default();
        s.set_viewport(Size::new(w as f32, h as f32));
        s.load_image(Arc::new(RgbaImage::new(w, h)), None);
        s
    }

    /// A drag from `a` to `b` in view space.
    fn drag(s: &mut EditorSession, a: Point, b: Point) {
        let now = Instant::now();
        s.pointer_down(a, now);
        s.pointer_move(b, now);
        s.pointer_up(now);
    }

    #[test]
    fn drag_commits_one_snapshot_after_baseline() {
        let mut s = session(100, 100);
        assert!(!s.has_edits());
        drag(&mut s, Point::new(10.0, 10.0), Point::new(40.0, 10.0));
        assert_eq!(s.history().len(), 2);
        assert!(s.has_edits());
        assert!(s.query(Point::new(25.0, 10.0)).unknown);
    }

    #[test]
    fn press_without_release_commits_previous_stroke() {
        let mut s = session(100, 100);
        s.set_brush_radius(2.0);
        let now = Instant::now();
        s.pointer_down(Point::new(10.0, 10.0), now);
        s.pointer_move(Point::new(30.0, 10.0), now);
        // Release lost; the next press starts a new stroke.
        s.pointer_down(Point::new(10.0, 60.0), now);
        assert_eq!(s.history().len(), 2);
        s.pointer_move(Point::new(30.0, 60.0), now);
        s.pointer_up(now);
        assert_eq!(s.history().len(), 3);

        s.undo();
        assert!(s.query(Point::new(20.0, 10.0)).unknown);
        assert!(!s.query(Point::new(20.0, 60.0)).unknown);
    }

    #[test]
    fn brush_radius_is_scaled_by_zoom() {
        let mut s = session(100, 100);
        s.set_viewport(Size::new(400.0, 400.0));
        s.fit_view();
        assert_eq!(s.zoom(), 4.0);
        s.set_brush_radius(8.0);
        // 8 view px = 2 image px.
        drag(&mut s, Point::new(200.0, 200.0), Point::new(201.0, 200.0));
        assert!(s.query(Point::new(50.0, 50.0)).unknown);
        assert!(s.query(Point::new(51.5, 50.0)).unknown);
        assert!(!s.query(Point::new(54.0, 50.0)).unknown);
    }

    #[test]
    fn click_paints_after_delay_and_double_click_cancels() {
        let mut s = session(100, 100);
        let t0 = Instant::now();
        s.pointer_down(Point::new(50.0, 50.0), t0);
        s.pointer_up(t0);
        assert!(s.next_deadline().is_some());
        s.tick(t0 + Duration::from_millis(350));
        assert!(s.query(Point::new(50.0, 50.0)).unknown);
        assert_eq!(s.history().len(), 2);

        s.pointer_down(Point::new(10.0, 10.0), t0);
        s.pointer_up(t0);
        s.pointer_down(Point::new(10.0, 10.0), t0 + Duration::from_millis(100));
        s.pointer_up(t0 + Duration::from_millis(100));
        s.double_click();
        s.tick(t0 + Duration::from_secs(5));
        assert!(!s.query(Point::new(10.0, 10.0)).unknown);
        assert_eq!(s.history().len(), 2);
    }

    #[test]
    fn bucket_fill_commits() {
        let mut s = session(20, 20);
        s.set_tool(Tool::Bucket);
        s.set_layer(LayerKind::Foreground);
        s.pointer_down(Point::new(5.0, 5.0), Instant::now());
        s.pointer_up(Instant::now());
        assert_eq!(s.masks().foreground().painted_count(), 400);
        assert_eq!(s.masks().unknown().painted_count(), 400);
        assert!(s.can_undo());
        s.undo();
        assert_eq!(s.masks().unknown().painted_count(), 0);
        s.redo();
        assert_eq!(s.masks().unknown().painted_count(), 400);
    }

    #[test]
    fn pan_tool_toggle_restores_previous_tool() {
        let mut s = session(10, 10);
        s.set_tool(Tool::Eraser);
        s.toggle_pan_tool();
        assert_eq!(s.tool(), Tool::Pan);
        s.toggle_pan_tool();
        assert_eq!(s.tool(), Tool::Eraser);
    }

    #[test]
    fn pan_drag_moves_view_without_painting() {
        let mut s = session(100, 100);
        s.set_viewport(Size::new(100.0, 100.0));
        s.zoom_at(Point::new(50.0, 50.0), 4.0);
        let before = s.mapper().pan();
        s.set_tool(Tool::Pan);
        drag(&mut s, Point::new(50.0, 50.0), Point::new(60.0, 45.0));
        let after = s.mapper().pan();
        assert_eq!(after - before, Point::new(10.0, -5.0));
        assert_eq!(s.masks().unknown().painted_count(), 0);
        assert!(s.history().is_empty());
    }

    #[test]
    fn cutout_and_trimap_are_exclusive() {
        let mut s = session(10, 10);
        s.toggle_cutout();
        assert_eq!(s.view_mode(), ViewMode::Cutout);
        s.toggle_invert();
        assert!(s.view_options().invert);
        s.toggle_trimap_view();
        assert_eq!(s.view_mode(), ViewMode::Trimap);
        assert!(!s.view_options().invert);
        s.toggle_invert();
        assert!(!s.view_options().invert);
    }

    #[test]
    fn cutout_needs_an_image() {
        let mut s = EditorSession::default();
        s.toggle_cutout();
        assert_eq!(s.view_mode(), ViewMode::Normal);
    }

    #[test]
    fn seed_trimap_initialises_masks_and_undo_returns_to_it() {
        let mut seed = GrayImage::new(10, 10);
        seed.put_pixel(2, 2, image::Luma([255]));
        seed.put_pixel(3, 3, image::Luma([128]));
        let mut s = EditorSession::default();
        s.set_viewport(Size::new(10.0, 10.0));
        s.load_image(Arc::new(RgbaImage::new(10, 10)), Some(&seed));
        assert!(s.query(Point::new(2.0, 2.0)).foreground);

        s.clear();
        assert_eq!(s.masks().unknown().painted_count(), 0);
        s.undo();
        assert_eq!(s.export().unwrap().trimap, seed);
    }

    #[test]
    fn mismatched_seed_starts_blank() {
        let seed = GrayImage::from_pixel(4, 4, image::Luma([255]));
        let mut s = EditorSession::default();
        s.load_image(Arc::new(RgbaImage::new(10, 10)), Some(&seed));
        assert_eq!(s.masks().unknown().painted_count(), 0);
        assert_eq!(s.masks().width(), 10);
    }

    #[test]
    fn zero_area_image_is_inert() {
        let mut s = EditorSession::default();
        s.set_viewport(Size::new(50.0, 50.0));
        s.load_image(Arc::new(RgbaImage::new(0, 0)), None);
        drag(&mut s, Point::new(1.0, 1.0), Point::new(20.0, 20.0));
        s.set_tool(Tool::Bucket);
        s.pointer_down(Point::new(1.0, 1.0), Instant::now());
        s.clear();
        assert!(s.masks().is_empty());
        assert!(s.masks().satisfies_containment());
        let export = s.export().unwrap();
        assert_eq!((export.width, export.height), (0, 0));
    }

    #[test]
    fn remove_image_resets_view_state() {
        let mut s = session(10, 10);
        s.toggle_cutout();
        s.toggle_invert();
        s.remove_image();
        assert!(!s.has_image());
        assert_eq!(s.view_mode(), ViewMode::Normal);
        assert!(!s.view_options().invert);
        assert!(s.export().is_none());
    }

    #[test]
    fn redraw_is_coalesced_over_a_drag() {
        let mut s = session(100, 100);
        s.take_redraw();
        let now = Instant::now();
        s.pointer_down(Point::new(10.0, 10.0), now);
        for x in 11..40 {
            s.pointer_move(Point::new(x as f32, 10.0), now);
        }
        assert!(s.take_redraw());
        assert!(!s.take_redraw());
        s.pointer_up(now);
        assert!(s.take_redraw());
    }

    #[test]
    fn brush_size_steps_apply_to_current_tool() {
        let mut s = session(10, 10);
        let brush = s.brush_radius().unwrap();
        s.grow_brush();
        assert!(s.brush_radius().unwrap() > brush);
        s.set_tool(Tool::Eraser);
        let eraser = s.brush_radius().unwrap();
        s.shrink_brush();
        assert!(s.brush_radius().unwrap() < eraser);
        s.set_tool(Tool::Pan);
        assert_eq!(s.brush_radius(), None);
    }
}
