use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;
use egui::{Color32, ColorImage, Key, PointerButton, Pos2, Rect, Stroke, TextureHandle, TextureOptions};

use trimap_editor::viewport::{Point, Size};
use trimap_editor::{EditorSession, EditorSettings, LayerKind, Tool, ViewMode};

use crate::io;
use crate::logger;

/// Wheel zoom sensitivity: factor = 1 + delta * this.
const WHEEL_ZOOM_RATE: f32 = 0.005;

pub struct TrimapApp {
    session: EditorSession,
    texture: Option<TextureHandle>,
    /// Screen rect of the canvas last frame.
    canvas_rect: Option<Rect>,

    image_path: Option<PathBuf>,
    trimap_path: Option<PathBuf>,
    pending_startup_file: Option<PathBuf>,
    status: String,

    /// Temporary pan while Space is held.
    space_pan_last: Option<Pos2>,
}

impl TrimapApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, startup_file: Option<PathBuf>) -> Self {
        Self {
            session: EditorSession::new(EditorSettings::load()),
            texture: None,
            canvas_rect: None,
            image_path: None,
            trimap_path: None,
            pending_startup_file: startup_file,
            status: String::new(),
            space_pan_last: None,
        }
    }

    fn to_point(pos: Pos2, rect: Rect) -> Point {
        Point::new(pos.x - rect.min.x, pos.y - rect.min.y)
    }

    // ---- file handling --------------------------------------------------

    fn open_image(&mut self, path: PathBuf) {
        let image = match io::load_image(&path) {
            Ok(img) => Arc::new(img),
            Err(e) => {
                log::error!("failed to open {}: {}", path.display(), e);
                self.status = format!("Open failed: {e}");
                return;
            }
        };
        let (w, h) = image.dimensions();

        // Pick up a trimap saved next to the image by an earlier session.
        let seed_path = io::default_trimap_path(&path);
        let seeded = seed_path.exists().then(|| io::load_trimap(&seed_path, w, h));
        match seeded {
            Some(Ok(masks)) => {
                self.session.load_image_with_masks(image, masks);
                self.trimap_path = Some(seed_path);
            }
            Some(Err(e)) => {
                log::warn!("ignoring {}: {}", seed_path.display(), e);
                self.session.load_image(image, None);
                self.trimap_path = None;
            }
            None => {
                self.session.load_image(image, None);
                self.trimap_path = None;
            }
        }
        self.status = format!("{} ({w}x{h})", path.display());
        self.image_path = Some(path);
    }

    fn open_trimap(&mut self, path: PathBuf) {
        let Some(image) = self.session.image().cloned() else {
            self.status = "Open an image first".to_string();
            return;
        };
        let (w, h) = image.dimensions();
        match io::load_trimap(&path, w, h) {
            Ok(masks) => {
                self.session.load_image_with_masks(image, masks);
                self.status = format!("Trimap {}", path.display());
                self.trimap_path = Some(path);
            }
            Err(e) => {
                log::warn!("failed to load trimap {}: {}", path.display(), e);
                self.status = format!("Trimap not loaded: {e}");
            }
        }
    }

    fn save(&mut self, save_as: bool) {
        let Some(export) = self.session.export() else {
            return;
        };
        let suggested = self
            .trimap_path
            .clone()
            .or_else(|| self.image_path.as_deref().map(io::default_trimap_path));
        let target = match (&suggested, save_as) {
            (Some(path), false) => Some(path.clone()),
            _ => io::pick_save_path(suggested.as_deref()),
        };
        let Some(path) = target else {
            return;
        };
        match io::save_trimap(&export.trimap, &path) {
            Ok(()) => {
                self.status = format!("Saved {}", path.display());
                self.trimap_path = Some(path);
            }
            Err(e) => {
                log::error!("failed to save {}: {}", path.display(), e);
                self.status = format!("Save failed: {e}");
            }
        }
    }

    fn remove_image(&mut self) {
        self.session.remove_image();
        self.image_path = None;
        self.trimap_path = None;
        self.status.clear();
    }

    // ---- input ----------------------------------------------------------

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (command, shift) = ctx.input(|i| (i.modifiers.command, i.modifiers.shift));
        let pressed = |key: Key| ctx.input(|i| i.key_pressed(key));

        if command {
            if pressed(Key::Z) {
                if shift {
                    self.session.redo();
                } else {
                    self.session.undo();
                }
            }
            if pressed(Key::Y) {
                self.session.redo();
            }
            if pressed(Key::O) {
                if let Some(path) = io::pick_image() {
                    self.open_image(path);
                }
            }
            if pressed(Key::S) {
                self.save(shift);
            }
            return;
        }

        let s = &mut self.session;
        if pressed(Key::B) {
            s.set_tool(Tool::Brush);
        }
        if pressed(Key::E) {
            s.set_tool(Tool::Eraser);
        }
        if pressed(Key::G) {
            s.set_tool(Tool::Bucket);
        }
        if pressed(Key::P) {
            s.toggle_pan_tool();
        }
        if pressed(Key::U) {
            s.set_layer(LayerKind::Unknown);
        }
        if pressed(Key::F) {
            s.set_layer(LayerKind::Foreground);
        }
        if pressed(Key::V) {
            s.toggle_trimap_view();
        }
        if pressed(Key::C) {
            s.toggle_cutout();
        }
        if pressed(Key::N) {
            s.toggle_invert();
        }
        if pressed(Key::I) {
            s.toggle_image_visibility();
        }
        if pressed(Key::Num1) {
            s.toggle_layer_visibility(LayerKind::Unknown);
        }
        if pressed(Key::Num2) {
            s.toggle_layer_visibility(LayerKind::Foreground);
        }
        if pressed(Key::PlusEquals) {
            s.zoom_in();
        }
        if pressed(Key::Minus) {
            s.zoom_out();
        }
        if pressed(Key::Num0) {
            s.fit_view();
        }

        // Bracket keys have no `Key` variant; read them from text events.
        let brackets: Vec<char> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|e| match e {
                    egui::Event::Text(t) => Some(t.chars().collect::<Vec<_>>()),
                    _ => None,
                })
                .flatten()
                .filter(|c| *c == '[' || *c == ']')
                .collect()
        });
        for c in brackets {
            if c == ']' {
                s.grow_brush();
            } else {
                s.shrink_brush();
            }
        }

        if pressed(Key::X) {
            self.remove_image();
        }
    }

    /// Route this frame's pointer events on the canvas to the session.
    fn handle_canvas_input(&mut self, ctx: &egui::Context, response: &egui::Response, rect: Rect) {
        let now = Instant::now();
        let space_held = ctx.input(|i| i.key_down(Key::Space));

        if response.dragged_by(PointerButton::Middle) {
            let d = response.drag_delta();
            self.session.pan_by(Point::new(d.x, d.y));
        }

        let events = ctx.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button: PointerButton::Primary,
                    pressed: true,
                    ..
                } if rect.contains(pos) => {
                    if space_held {
                        self.space_pan_last = Some(pos);
                    } else {
                        self.session.pointer_down(Self::to_point(pos, rect), now);
                    }
                }
                egui::Event::PointerButton {
                    button: PointerButton::Primary,
                    pressed: false,
                    ..
                } => {
                    self.space_pan_last = None;
                    self.session.pointer_up(now);
                }
                egui::Event::PointerMoved(pos) => {
                    if let Some(last) = self.space_pan_last {
                        self.session.pan_by(Point::new(pos.x - last.x, pos.y - last.y));
                        self.space_pan_last = Some(pos);
                    } else {
                        self.session.pointer_move(Self::to_point(pos, rect), now);
                    }
                }
                _ => {}
            }
        }

        if response.double_clicked() {
            self.session.double_click();
        }

        if response.hovered() {
            let (scroll, hover) = ctx.input(|i| (i.scroll_delta.y, i.pointer.hover_pos()));
            if scroll.abs() > 0.1
                && let Some(pos) = hover
            {
                let factor = 1.0 + scroll * WHEEL_ZOOM_RATE;
                self.session.zoom_at(Self::to_point(pos, rect), factor);
            }
        }
    }

    // ---- drawing --------------------------------------------------------

    fn upload_frame(&mut self, ctx: &egui::Context) {
        let frame = self.session.render();
        let size = [frame.width() as usize, frame.height() as usize];
        let image = ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        match &mut self.texture {
            Some(tex) => tex.set(image, TextureOptions::NEAREST),
            None => {
                self.texture = Some(ctx.load_texture("trimap_view", image, TextureOptions::NEAREST));
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            if ui.button("Open image…").clicked()
                && let Some(path) = io::pick_image()
            {
                self.open_image(path);
            }
            let has_image = self.session.has_image();
            if ui
                .add_enabled(has_image, egui::Button::new("Open trimap…"))
                .clicked()
                && let Some(path) = io::pick_trimap()
            {
                self.open_trimap(path);
            }
            if ui.add_enabled(has_image, egui::Button::new("Save")).clicked() {
                self.save(false);
            }
            if ui.add_enabled(has_image, egui::Button::new("Remove")).clicked() {
                self.remove_image();
            }
            ui.separator();

            let current = self.session.tool();
            for tool in [Tool::Brush, Tool::Eraser, Tool::Bucket] {
                if ui.selectable_label(current == tool, tool.label()).clicked() {
                    self.session.set_tool(tool);
                }
            }
            if ui.selectable_label(current == Tool::Pan, "Pan").clicked() {
                self.session.toggle_pan_tool();
            }
            ui.separator();

            let layer = self.session.layer();
            for &kind in LayerKind::all() {
                if ui.selectable_label(layer == kind, kind.label()).clicked() {
                    self.session.set_layer(kind);
                }
            }
            ui.separator();

            if let Some(mut radius) = self.session.brush_radius() {
                let b = *self.session.brushes();
                if ui
                    .add(egui::Slider::new(&mut radius, b.min..=b.max).text("Size"))
                    .changed()
                {
                    self.session.set_brush_radius(radius);
                }
                ui.separator();
            }

            let mode = self.session.view_mode();
            if ui.selectable_label(mode == ViewMode::Trimap, "Trimap").clicked() {
                self.session.toggle_trimap_view();
            }
            if ui
                .add_enabled(has_image, egui::SelectableLabel::new(mode == ViewMode::Cutout, "Cutout"))
                .clicked()
            {
                self.session.toggle_cutout();
            }
            let inverted = self.session.view_options().invert;
            if ui
                .add_enabled(mode == ViewMode::Cutout, egui::SelectableLabel::new(inverted, "Invert"))
                .clicked()
            {
                self.session.toggle_invert();
            }
            ui.separator();

            let opts = self.session.view_options().clone();
            if ui.selectable_label(opts.show_image, "Image").clicked() {
                self.session.toggle_image_visibility();
            }
            if ui.selectable_label(opts.show_unknown, "Show unknown").clicked() {
                self.session.toggle_layer_visibility(LayerKind::Unknown);
            }
            if ui.selectable_label(opts.show_foreground, "Show foreground").clicked() {
                self.session.toggle_layer_visibility(LayerKind::Foreground);
            }
            ui.separator();

            if ui
                .add_enabled(self.session.can_undo(), egui::Button::new("Undo"))
                .clicked()
            {
                self.session.undo();
            }
            if ui
                .add_enabled(self.session.can_redo(), egui::Button::new("Redo"))
                .clicked()
            {
                self.session.redo();
            }
            if ui.add_enabled(has_image, egui::Button::new("Clear")).clicked() {
                self.session.clear();
            }
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(format!("{:.0}%", self.session.zoom() * 100.0));
            ui.separator();
            ui.label(format!(
                "{} · {}",
                self.session.tool().label(),
                self.session.layer().label()
            ));
            let history = self.session.history();
            ui.separator();
            ui.label(format!("History {}/{}", history.index() + 1, history.len().max(1)));
            if !self.status.is_empty() {
                ui.separator();
                ui.label(self.status.as_str());
            }
            if let Some(path) = logger::log_path() {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(format!("Log: {}", path.display()));
                });
            }
        });
    }
}

/// Radius and colour of the brush outline at `view_pos`, or `None` when no
/// outline belongs there: no image, a tool without a brush, or the cursor
/// off the image.
fn brush_outline(session: &EditorSession, view_pos: Point) -> Option<(f32, Color32)> {
    let radius = session.brush_radius()?;
    let (w, h) = session.image_size()?;
    let p = session.mapper().to_image_space(view_pos);
    if !(p.x >= 0.0 && p.y >= 0.0 && p.x < w as f32 && p.y < h as f32) {
        return None;
    }
    let color = match session.tool() {
        Tool::Eraser => Color32::RED,
        _ => Color32::WHITE,
    };
    Some((radius, color))
}

impl eframe::App for TrimapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(path) = self.pending_startup_file.take() {
            self.open_image(path);
        }

        let title = match &self.image_path {
            Some(path) => format!("Trimap Editor - {}", path.display()),
            None => "Trimap Editor".to_string(),
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));

        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let sense = egui::Sense::click_and_drag().union(egui::Sense::hover());
                let (response, painter) = ui.allocate_painter(ui.available_size(), sense);
                let rect = response.rect;
                if self.canvas_rect.map(|r| r.size()) != Some(rect.size()) {
                    self.session.set_viewport(Size::new(rect.width(), rect.height()));
                }
                self.canvas_rect = Some(rect);

                self.handle_canvas_input(ctx, &response, rect);
                self.session.tick(Instant::now());

                if self.session.take_redraw() || self.texture.is_none() {
                    self.upload_frame(ctx);
                }
                if let Some(tex) = &self.texture {
                    let size = tex.size_vec2();
                    let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                    painter.image(tex.id(), Rect::from_min_size(rect.min, size), uv, Color32::WHITE);
                }

                if let Some(pos) = response.hover_pos()
                    && let Some((radius, color)) =
                        brush_outline(&self.session, Point::new(pos.x - rect.min.x, pos.y - rect.min.y))
                {
                    painter.circle_stroke(pos, radius, Stroke::new(1.0, color));
                    painter.circle_stroke(pos, radius + 1.0, Stroke::new(1.0, Color32::BLACK));
                }
            });

        if let Some(deadline) = self.session.next_deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()));
        }
    }
}
