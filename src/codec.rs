//! Trimap codec: the two mask layers <-> one 3-level grayscale raster.
//!
//! Canonical values are 0 (background), 128 (unknown) and 255 (foreground).
//! Decoding uses tolerant thresholds so rasters that went through lossy
//! recompression still classify correctly.

use image::{DynamicImage, GrayImage, Luma};

use crate::canvas::{MaskLayer, MaskLayerStore, PAINTED, PixelState};
use crate::error::TrimapError;

pub const BACKGROUND_VALUE: u8 = 0;
pub const UNKNOWN_VALUE: u8 = 128;
pub const FOREGROUND_VALUE: u8 = 255;

/// Values strictly above this decode as foreground.
pub const FOREGROUND_THRESHOLD: u8 = 200;
/// Values strictly above this (and not foreground) decode as unknown.
pub const UNKNOWN_THRESHOLD: u8 = 64;

/// Canonical raster value for one pixel.
pub fn trimap_value(px: PixelState) -> u8 {
    if px.foreground {
        FOREGROUND_VALUE
    } else if px.unknown {
        UNKNOWN_VALUE
    } else {
        BACKGROUND_VALUE
    }
}

/// Classify a raster value. Foreground always implies unknown.
pub fn classify(value: u8) -> PixelState {
    if value > FOREGROUND_THRESHOLD {
        PixelState {
            foreground: true,
            unknown: true,
        }
    } else if value > UNKNOWN_THRESHOLD {
        PixelState {
            foreground: false,
            unknown: true,
        }
    } else {
        PixelState::default()
    }
}

pub fn encode(masks: &MaskLayerStore) -> GrayImage {
    GrayImage::from_fn(masks.width(), masks.height(), |x, y| {
        Luma([trimap_value(masks.query_pixel(x, y))])
    })
}

pub fn decode(raster: &GrayImage) -> MaskLayerStore {
    let (w, h) = raster.dimensions();
    let mut unknown = MaskLayer::new(w, h);
    let mut foreground = MaskLayer::new(w, h);
    for (idx, &value) in raster.as_raw().iter().enumerate() {
        let px = classify(value);
        if px.unknown {
            unknown.set_at(idx, PAINTED);
        }
        if px.foreground {
            foreground.set_at(idx, PAINTED);
        }
    }
    // Same dimensions by construction.
    MaskLayerStore::from_layers(unknown, foreground).unwrap_or_else(|| MaskLayerStore::new(w, h))
}

/// Decode an arbitrary host raster as a seed for a `width × height` image.
/// Colour rasters are reduced to luma first.
pub fn decode_checked(raster: &DynamicImage, width: u32, height: u32) -> Result<MaskLayerStore, TrimapError> {
    if raster.width() != width || raster.height() != height {
        return Err(TrimapError::DimensionMismatch {
            expected: (width, height),
            found: (raster.width(), raster.height()),
        });
    }
    Ok(decode(&raster.to_luma8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::LayerKind;
    use crate::viewport::Point;
    use proptest::prelude::*;

    #[test]
    fn encode_three_levels() {
        let mut unknown = MaskLayer::new(5, 5);
        let mut foreground = MaskLayer::new(5, 5);
        unknown.set(1, 1, true);
        unknown.set(2, 2, true);
        foreground.set(1, 1, true);
        let masks = MaskLayerStore::from_layers(unknown, foreground).unwrap();

        let raster = encode(&masks);
        assert_eq!(raster.get_pixel(1, 1)[0], 255);
        assert_eq!(raster.get_pixel(2, 2)[0], 128);
        let others = raster
            .enumerate_pixels()
            .filter(|(x, y, _)| (*x, *y) != (1, 1) && (*x, *y) != (2, 2))
            .all(|(_, _, p)| p[0] == 0);
        assert!(others);
    }

    #[test]
    fn decode_tolerates_recompression_noise() {
        assert_eq!(classify(201), classify(255));
        assert_eq!(classify(140), classify(128));
        assert_eq!(classify(65), classify(128));
        assert_eq!(classify(64), PixelState::default());
        assert_eq!(classify(10), PixelState::default());
        assert!(classify(230).unknown);
    }

    #[test]
    fn decode_checked_rejects_wrong_size() {
        let raster = DynamicImage::ImageLuma8(GrayImage::new(3, 3));
        let err = decode_checked(&raster, 4, 3).unwrap_err();
        assert!(matches!(err, TrimapError::DimensionMismatch { .. }));
    }

    #[test]
    fn decode_checked_accepts_gray_rgb() {
        let rgb = image::RgbImage::from_pixel(2, 2, image::Rgb([128, 128, 128]));
        let masks = decode_checked(&DynamicImage::ImageRgb8(rgb), 2, 2).unwrap();
        assert!(masks.query_pixel(1, 1).unknown);
        assert!(!masks.query_pixel(1, 1).foreground);
    }

    #[test]
    fn empty_raster_decodes_to_empty_store() {
        let masks = decode(&GrayImage::new(0, 0));
        assert!(masks.is_empty());
        assert_eq!(encode(&masks).dimensions(), (0, 0));
    }

    proptest! {
        #[test]
        fn canonical_round_trip(
            stamps in prop::collection::vec((any::<bool>(), 0.0f32..24.0, 0.0f32..16.0, 0.0f32..4.0), 0..12)
        ) {
            let mut masks = MaskLayerStore::new(24, 16);
            for (fg, x, y, r) in stamps {
                let layer = if fg { LayerKind::Foreground } else { LayerKind::Unknown };
                masks.paint(layer, Point::new(x, y), r);
            }
            prop_assert_eq!(decode(&encode(&masks)), masks);
        }
    }
}
