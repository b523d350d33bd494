use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::canvas::{LayerKind, MaskLayerStore};
use crate::viewport::Point;

/// Stamp spacing as a fraction of the brush radius.
pub const DEFAULT_SPACING: f32 = 0.3;
/// How long a click waits for a drag or a double-click before it paints.
pub const DEFAULT_DOT_DELAY: Duration = Duration::from_millis(300);

// ============================================================================
// TOOL SELECTION
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Bucket,
    Pan,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Bucket => "Bucket",
            Tool::Pan => "Pan",
        }
    }

    /// The stroke operation this tool performs, if it draws.
    pub fn stroke_op(&self) -> Option<StrokeOp> {
        match self {
            Tool::Brush => Some(StrokeOp::Paint),
            Tool::Eraser => Some(StrokeOp::Erase),
            Tool::Bucket | Tool::Pan => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrokeOp {
    Paint,
    Erase,
}

/// Brush radii in view pixels, kept separately for brush and eraser.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrushSizes {
    pub brush: f32,
    pub eraser: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for BrushSizes {
    fn default() -> Self {
        Self {
            brush: 20.0,
            eraser: 20.0,
            min: 1.0,
            max: 200.0,
            step: 5.0,
        }
    }
}

impl BrushSizes {
    /// Radius used by `tool`. Only brush and eraser have one.
    pub fn radius(&self, tool: Tool) -> Option<f32> {
        match tool {
            Tool::Brush => Some(self.brush),
            Tool::Eraser => Some(self.eraser),
            _ => None,
        }
    }

    pub fn set_radius(&mut self, tool: Tool, radius: f32) {
        let radius = radius.clamp(self.min, self.max);
        match tool {
            Tool::Brush => self.brush = radius,
            Tool::Eraser => self.eraser = radius,
            _ => {}
        }
    }

    pub fn adjust(&mut self, tool: Tool, steps: f32) {
        if let Some(current) = self.radius(tool) {
            self.set_radius(tool, current + steps * self.step);
        }
    }
}

// ============================================================================
// STROKE RASTERIZER
// ============================================================================

/// Turns pointer segments into evenly spaced disc stamps at image resolution.
#[derive(Clone, Copy, Debug)]
pub struct StrokeRasterizer {
    spacing: f32,
}

impl Default for StrokeRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_SPACING)
    }
}

impl StrokeRasterizer {
    pub fn new(spacing: f32) -> Self {
        let spacing = if spacing > 0.0 && spacing.is_finite() {
            spacing
        } else {
            DEFAULT_SPACING
        };
        Self { spacing }
    }

    pub fn stamp(&self, masks: &mut MaskLayerStore, layer: LayerKind, op: StrokeOp, at: Point, radius: f32) {
        match op {
            StrokeOp::Paint => masks.paint(layer, at, radius),
            StrokeOp::Erase => masks.erase(layer, at, radius),
        }
    }

    /// Number of steps for a segment of length `distance`.
    pub fn steps_for(&self, distance: f32, radius: f32) -> usize {
        let gap = radius * self.spacing;
        if !(gap > 0.0) || !distance.is_finite() {
            return 1;
        }
        ((distance / gap).ceil() as usize).max(1)
    }

    /// Stamp from `p0` (exclusive) to `p1` (inclusive). All coordinates and
    /// the radius are in image pixels. Returns the number of stamps.
    pub fn rasterize_segment(
        &self,
        masks: &mut MaskLayerStore,
        layer: LayerKind,
        op: StrokeOp,
        p0: Point,
        p1: Point,
        radius: f32,
    ) -> usize {
        let steps = self.steps_for(p0.distance(p1), radius);
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            self.stamp(masks, layer, op, p0.lerp(p1, t), radius);
        }
        steps
    }
}

// ============================================================================
// STROKE STATE MACHINE – Idle → PendingDot → Drawing → Idle
// ============================================================================

/// Parameters fixed for one stroke.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeParams {
    pub layer: LayerKind,
    pub op: StrokeOp,
    /// Image pixels.
    pub radius: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StrokeState {
    Idle,
    /// A click that has not painted yet. Paints on the first movement, or
    /// once `deadline` passes; a double-click discards it.
    PendingDot {
        at: Point,
        params: StrokeParams,
        deadline: Instant,
        pointer_down: bool,
    },
    Drawing { last: Point, params: StrokeParams },
}

/// What a stroke event did to the masks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrokeOutcome {
    /// Mask pixels may have changed.
    pub changed: bool,
    /// The stroke finished and should be recorded in history.
    pub committed: bool,
}

#[derive(Clone, Debug)]
pub struct StrokeMachine {
    state: StrokeState,
    dot_delay: Duration,
    rasterizer: StrokeRasterizer,
}

impl Default for StrokeMachine {
    fn default() -> Self {
        Self::new(DEFAULT_DOT_DELAY, StrokeRasterizer::default())
    }
}

impl StrokeMachine {
    pub fn new(dot_delay: Duration, rasterizer: StrokeRasterizer) -> Self {
        Self {
            state: StrokeState::Idle,
            dot_delay,
            rasterizer,
        }
    }

    pub fn state(&self) -> &StrokeState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, StrokeState::Idle)
    }

    /// When the pending dot fires, if one is waiting.
    pub fn pending_deadline(&self) -> Option<Instant> {
        match self.state {
            StrokeState::PendingDot { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// Pointer pressed. Holds the dot; nothing is painted yet. A dot still
    /// pending from an earlier click is dropped, since a second press inside
    /// the delay is the start of a double-click.
    pub fn begin(&mut self, at: Point, params: StrokeParams, now: Instant) {
        if matches!(self.state, StrokeState::PendingDot { .. }) {
            log::debug!("pending dot replaced by a new press");
        }
        self.state = StrokeState::PendingDot {
            at,
            params,
            deadline: now.checked_add(self.dot_delay).unwrap_or(now),
            pointer_down: true,
        };
    }

    /// Pointer moved to `to` (image space).
    pub fn extend(&mut self, masks: &mut MaskLayerStore, to: Point) -> StrokeOutcome {
        match self.state {
            StrokeState::PendingDot {
                at,
                params,
                pointer_down: true,
                ..
            } if at != to => {
                let r = &self.rasterizer;
                r.stamp(masks, params.layer, params.op, at, params.radius);
                r.rasterize_segment(masks, params.layer, params.op, at, to, params.radius);
                self.state = StrokeState::Drawing { last: to, params };
                StrokeOutcome {
                    changed: true,
                    committed: false,
                }
            }
            StrokeState::Drawing { last, params } => {
                if last == to {
                    return StrokeOutcome::default();
                }
                self.rasterizer
                    .rasterize_segment(masks, params.layer, params.op, last, to, params.radius);
                self.state = StrokeState::Drawing { last: to, params };
                StrokeOutcome {
                    changed: true,
                    committed: false,
                }
            }
            _ => StrokeOutcome::default(),
        }
    }

    /// Pointer released. A drag commits now; an unmoved click keeps waiting
    /// for its deadline.
    pub fn end(&mut self) -> StrokeOutcome {
        match self.state {
            StrokeState::Drawing { .. } => {
                self.state = StrokeState::Idle;
                StrokeOutcome {
                    changed: false,
                    committed: true,
                }
            }
            StrokeState::PendingDot {
                ref mut pointer_down,
                ..
            } => {
                *pointer_down = false;
                StrokeOutcome::default()
            }
            StrokeState::Idle => StrokeOutcome::default(),
        }
    }

    /// Fire the pending dot if its deadline has passed. A released click
    /// commits; a held one keeps drawing until release.
    pub fn tick(&mut self, masks: &mut MaskLayerStore, now: Instant) -> StrokeOutcome {
        let StrokeState::PendingDot {
            at,
            params,
            deadline,
            pointer_down,
        } = self.state
        else {
            return StrokeOutcome::default();
        };
        if now < deadline {
            return StrokeOutcome::default();
        }
        self.rasterizer
            .stamp(masks, params.layer, params.op, at, params.radius);
        if pointer_down {
            self.state = StrokeState::Drawing { last: at, params };
            StrokeOutcome {
                changed: true,
                committed: false,
            }
        } else {
            self.state = StrokeState::Idle;
            StrokeOutcome {
                changed: true,
                committed: true,
            }
        }
    }

    /// Double-click: discard a pending dot without painting. Returns true if
    /// one was discarded.
    pub fn cancel_pending(&mut self) -> bool {
        if matches!(self.state, StrokeState::PendingDot { .. }) {
            self.state = StrokeState::Idle;
            true
        } else {
            false
        }
    }

    /// Abandon whatever is in flight. Paint already applied stays.
    pub fn reset(&mut self) {
        self.state = StrokeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(radius: f32) -> StrokeParams {
        StrokeParams {
            layer: LayerKind::Unknown,
            op: StrokeOp::Paint,
            radius,
        }
    }

    #[test]
    fn step_count_follows_spacing() {
        let r = StrokeRasterizer::default();
        assert_eq!(r.steps_for(0.0, 10.0), 1);
        assert_eq!(r.steps_for(3.0, 10.0), 1);
        assert_eq!(r.steps_for(3.1, 10.0), 2);
        assert_eq!(r.steps_for(30.0, 10.0), 10);
        assert_eq!(r.steps_for(5.0, 0.0), 1);
    }

    #[test]
    fn long_segment_leaves_no_gaps() {
        let mut masks = MaskLayerStore::new(200, 20);
        let r = StrokeRasterizer::default();
        r.rasterize_segment(
            &mut masks,
            LayerKind::Unknown,
            StrokeOp::Paint,
            Point::new(5.0, 10.0),
            Point::new(195.0, 10.0),
            2.0,
        );
        for x in 6..195 {
            assert!(masks.query_pixel(x, 10).unknown, "gap at x={x}");
        }
    }

    #[test]
    fn click_paints_only_after_delay() {
        let mut masks = MaskLayerStore::new(50, 50);
        let mut m = StrokeMachine::default();
        let t0 = Instant::now();
        m.begin(Point::new(10.0, 10.0), params(2.0), t0);
        assert_eq!(m.end(), StrokeOutcome::default());
        assert_eq!(m.tick(&mut masks, t0 + Duration::from_millis(100)), StrokeOutcome::default());
        assert!(!masks.query_pixel(10, 10).unknown);

        let out = m.tick(&mut masks, t0 + Duration::from_millis(300));
        assert!(out.changed && out.committed);
        assert!(masks.query_pixel(10, 10).unknown);
        assert!(m.is_idle());
    }

    #[test]
    fn unrepresentable_delay_fires_on_next_tick() {
        let mut masks = MaskLayerStore::new(20, 20);
        let mut m = StrokeMachine::new(Duration::MAX, StrokeRasterizer::default());
        let t0 = Instant::now();
        m.begin(Point::new(5.0, 5.0), params(1.0), t0);
        assert_eq!(m.pending_deadline(), Some(t0));
        m.end();
        assert!(m.tick(&mut masks, t0).committed);
        assert!(masks.query_pixel(5, 5).unknown);
    }

    #[test]
    fn double_click_discards_dot() {
        let mut masks = MaskLayerStore::new(50, 50);
        let mut m = StrokeMachine::default();
        let t0 = Instant::now();
        m.begin(Point::new(10.0, 10.0), params(2.0), t0);
        m.end();
        m.begin(Point::new(10.0, 10.0), params(2.0), t0 + Duration::from_millis(120));
        m.end();
        assert!(m.cancel_pending());
        m.tick(&mut masks, t0 + Duration::from_secs(2));
        assert_eq!(masks.unknown().painted_count(), 0);
        assert!(m.is_idle());
    }

    #[test]
    fn movement_applies_dot_immediately() {
        let mut masks = MaskLayerStore::new(50, 50);
        let mut m = StrokeMachine::default();
        let t0 = Instant::now();
        m.begin(Point::new(10.0, 10.0), params(2.0), t0);
        let out = m.extend(&mut masks, Point::new(30.0, 10.0));
        assert!(out.changed && !out.committed);
        assert!(masks.query_pixel(10, 10).unknown);
        assert!(masks.query_pixel(20, 10).unknown);
        assert!(masks.query_pixel(30, 10).unknown);
        assert_eq!(m.pending_deadline(), None);

        let out = m.end();
        assert!(out.committed);
    }

    #[test]
    fn hover_after_release_does_not_paint() {
        let mut masks = MaskLayerStore::new(50, 50);
        let mut m = StrokeMachine::default();
        m.begin(Point::new(10.0, 10.0), params(2.0), Instant::now());
        m.end();
        let out = m.extend(&mut masks, Point::new(40.0, 40.0));
        assert_eq!(out, StrokeOutcome::default());
        assert_eq!(masks.unknown().painted_count(), 0);
    }

    #[test]
    fn held_click_keeps_drawing_after_deadline() {
        let mut masks = MaskLayerStore::new(50, 50);
        let mut m = StrokeMachine::default();
        let t0 = Instant::now();
        m.begin(Point::new(10.0, 10.0), params(1.0), t0);
        let out = m.tick(&mut masks, t0 + DEFAULT_DOT_DELAY);
        assert!(out.changed && !out.committed);
        m.extend(&mut masks, Point::new(15.0, 10.0));
        assert!(masks.query_pixel(15, 10).unknown);
        assert!(m.end().committed);
    }

    #[test]
    fn brush_sizes_clamp_per_tool() {
        let mut sizes = BrushSizes::default();
        sizes.adjust(Tool::Brush, 1.0);
        assert_eq!(sizes.brush, 25.0);
        assert_eq!(sizes.eraser, 20.0);
        sizes.set_radius(Tool::Eraser, 0.0);
        assert_eq!(sizes.eraser, 1.0);
        sizes.adjust(Tool::Brush, 1000.0);
        assert_eq!(sizes.brush, 200.0);
        sizes.adjust(Tool::Bucket, 1.0);
        assert_eq!(sizes.radius(Tool::Bucket), None);
    }
}
