use std::collections::VecDeque;

use crate::canvas::{LayerKind, MaskLayer, MaskLayerStore};
use crate::viewport::Point;

/// Outcome of one bucket fill.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillResult {
    /// Number of pixels newly painted on the target layer.
    pub filled: usize,
    /// Inclusive bounding box `(min_x, min_y, max_x, max_y)` of the region.
    pub bbox: Option<(u32, u32, u32, u32)>,
}

impl FillResult {
    pub fn is_noop(&self) -> bool {
        self.filled == 0
    }
}

/// 4-connected fill of the unpainted region around `seed` on `layer`.
///
/// Painted pixels and the canvas edges bound the region. A painted or
/// off-canvas seed is a no-op. Filling foreground paints the same region on
/// unknown; filling unknown never touches foreground.
pub fn flood_fill(masks: &mut MaskLayerStore, layer: LayerKind, seed: Point) -> FillResult {
    if masks.is_empty() || !(seed.x >= 0.0 && seed.y >= 0.0) {
        return FillResult::default();
    }
    let (sx, sy) = (seed.x as u32, seed.y as u32);
    if sx >= masks.width() || sy >= masks.height() {
        return FillResult::default();
    }

    let (region, bbox) = unpainted_region(masks.layer(layer), sx, sy);
    if region.is_empty() {
        return FillResult::default();
    }
    masks.paint_indices(layer, &region);
    log::debug!("{} fill at ({sx}, {sy}) painted {} px", layer.label(), region.len());

    FillResult {
        filled: region.len(),
        bbox,
    }
}

/// Breadth-first walk over unpainted pixels. Returns the flat indices of the
/// connected component containing `(start_x, start_y)` and its bbox; empty
/// when the start pixel is painted.
fn unpainted_region(
    mask: &MaskLayer,
    start_x: u32,
    start_y: u32,
) -> (Vec<usize>, Option<(u32, u32, u32, u32)>) {
    let w = mask.width();
    let h = mask.height();
    let wu = w as usize;
    let seed_idx = start_y as usize * wu + start_x as usize;
    if mask.is_painted_at(seed_idx) {
        return (Vec::new(), None);
    }

    // Separate visited map so walls are never re-read as region pixels.
    let mut visited = vec![false; wu * h as usize];
    let mut region = Vec::new();
    let mut queue: VecDeque<usize> = VecDeque::with_capacity(4096);

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (start_x, start_y, start_x, start_y);

    visited[seed_idx] = true;
    queue.push_back(seed_idx);

    while let Some(idx) = queue.pop_front() {
        region.push(idx);
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        let mut visit = |ni: usize| {
            if !visited[ni] && !mask.is_painted_at(ni) {
                visited[ni] = true;
                queue.push_back(ni);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - wu);
        }
        if y + 1 < h {
            visit(idx + wu);
        }
    }

    (region, Some((min_x, min_y, max_x, max_y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(masks: &mut MaskLayerStore, layer: LayerKind) {
        // Square outline from (10,10) to (20,20).
        for i in 10..=20 {
            for (x, y) in [(i, 10), (i, 20), (10, i), (20, i)] {
                masks.paint(layer, Point::new(x as f32 + 0.5, y as f32 + 0.5), 0.0);
            }
        }
    }

    #[test]
    fn blank_layer_fills_completely() {
        let mut masks = MaskLayerStore::new(100, 100);
        let res = flood_fill(&mut masks, LayerKind::Unknown, Point::new(10.0, 10.0));
        assert_eq!(res.filled, 100 * 100);
        assert_eq!(res.bbox, Some((0, 0, 99, 99)));
        assert_eq!(masks.unknown().painted_count(), 100 * 100);
        assert_eq!(masks.foreground().painted_count(), 0);
    }

    #[test]
    fn enclosed_region_fills_exactly_the_interior() {
        let mut masks = MaskLayerStore::new(40, 40);
        ring(&mut masks, LayerKind::Unknown);
        let walls = masks.unknown().painted_count();
        let res = flood_fill(&mut masks, LayerKind::Unknown, Point::new(15.0, 15.0));
        assert_eq!(res.filled, 9 * 9);
        assert_eq!(res.bbox, Some((11, 11, 19, 19)));
        assert_eq!(masks.unknown().painted_count(), walls + 81);
        assert!(!masks.query_pixel(5, 5).unknown);
        assert!(!masks.query_pixel(25, 25).unknown);
    }

    #[test]
    fn painted_seed_is_noop() {
        let mut masks = MaskLayerStore::new(40, 40);
        ring(&mut masks, LayerKind::Unknown);
        let before = masks.clone();
        let res = flood_fill(&mut masks, LayerKind::Unknown, Point::new(10.5, 15.0));
        assert!(res.is_noop());
        assert_eq!(masks, before);
    }

    #[test]
    fn out_of_bounds_seed_is_noop() {
        let mut masks = MaskLayerStore::new(8, 8);
        for seed in [Point::new(-1.0, 2.0), Point::new(8.0, 0.0), Point::new(0.0, 99.0)] {
            assert!(flood_fill(&mut masks, LayerKind::Foreground, seed).is_noop());
        }
        assert_eq!(masks.unknown().painted_count(), 0);
    }

    #[test]
    fn foreground_fill_also_marks_unknown() {
        let mut masks = MaskLayerStore::new(40, 40);
        ring(&mut masks, LayerKind::Foreground);
        flood_fill(&mut masks, LayerKind::Foreground, Point::new(15.0, 15.0));
        let px = masks.query_pixel(15, 15);
        assert!(px.foreground && px.unknown);
        assert!(masks.satisfies_containment());
        assert!(!masks.query_pixel(2, 2).unknown);
    }

    #[test]
    fn foreground_fill_crosses_unknown_only_pixels() {
        // Unknown paint is not a wall for the foreground layer.
        let mut masks = MaskLayerStore::new(10, 10);
        masks.paint(LayerKind::Unknown, Point::new(5.0, 5.0), 2.0);
        let res = flood_fill(&mut masks, LayerKind::Foreground, Point::new(0.0, 0.0));
        assert_eq!(res.filled, 100);
        assert_eq!(masks.foreground().painted_count(), 100);
    }

    #[test]
    fn unknown_fill_is_blocked_by_unknown_walls() {
        let mut masks = MaskLayerStore::new(10, 10);
        // Full-height wall at x = 5.
        for y in 0..10 {
            masks.paint(LayerKind::Unknown, Point::new(5.5, y as f32 + 0.5), 0.0);
        }
        let res = flood_fill(&mut masks, LayerKind::Unknown, Point::new(1.0, 1.0));
        assert_eq!(res.filled, 50);
        assert!(!masks.query_pixel(7, 3).unknown);
    }
}
