use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder, RgbaImage};
use rfd::FileDialog;

use trimap_editor::codec;
use trimap_editor::{MaskLayerStore, TrimapError};

/// Extensions offered in the open dialogs.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tga", "tif", "tiff"];

/// Decode any supported image file to RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage, TrimapError> {
    let img = image::open(path)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(TrimapError::EmptyImage);
    }
    log::info!("opened {} ({}x{})", path.display(), img.width(), img.height());
    Ok(img)
}

/// Decode a trimap file as the seed for a `width × height` image.
pub fn load_trimap(path: &Path, width: u32, height: u32) -> Result<MaskLayerStore, TrimapError> {
    let raster = image::open(path)?;
    codec::decode_checked(&raster, width, height)
}

/// Write an 8-bit grayscale PNG.
pub fn encode_png<W: Write>(raster: &GrayImage, writer: W) -> Result<(), TrimapError> {
    PngEncoder::new(writer).write_image(
        raster.as_raw(),
        raster.width(),
        raster.height(),
        ColorType::L8,
    )?;
    Ok(())
}

pub fn save_trimap(raster: &GrayImage, path: &Path) -> Result<(), TrimapError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_png(raster, &mut writer)?;
    writer.flush()?;
    log::info!("saved trimap {}", path.display());
    Ok(())
}

/// Save a rendered view. The format follows the extension.
pub fn save_render(frame: &RgbaImage, path: &Path) -> Result<(), TrimapError> {
    frame.save(path)?;
    log::info!("saved render {}", path.display());
    Ok(())
}

const TRIMAP_SUFFIX: &str = "_trimap";

/// `photo.jpg` -> `photo_trimap.png` next to it.
pub fn default_trimap_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    image_path.with_file_name(format!("{stem}{TRIMAP_SUFFIX}.png"))
}

/// True for files written by [`default_trimap_path`].
pub fn is_trimap_sidecar(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.to_string_lossy().ends_with(TRIMAP_SUFFIX))
}

// ---- dialogs ------------------------------------------------------------

pub fn pick_image() -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Open image")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

pub fn pick_trimap() -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Open trimap")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
}

pub fn pick_save_path(suggested: Option<&Path>) -> Option<PathBuf> {
    let mut dialog = FileDialog::new()
        .set_title("Save trimap")
        .add_filter("PNG", &["png"]);
    if let Some(path) = suggested {
        if let Some(dir) = path.parent() {
            dialog = dialog.set_directory(dir);
        }
        if let Some(name) = path.file_name() {
            dialog = dialog.set_file_name(name.to_string_lossy());
        }
    }
    dialog.save_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_keeps_the_three_levels() {
        let mut raster = GrayImage::new(3, 1);
        raster.put_pixel(1, 0, image::Luma([128]));
        raster.put_pixel(2, 0, image::Luma([255]));
        let mut bytes = Vec::new();
        encode_png(&raster, &mut bytes).unwrap();
        let back = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(back, raster);
    }

    #[test]
    fn trimap_path_sits_next_to_image() {
        assert_eq!(
            default_trimap_path(Path::new("/tmp/shots/cat.jpg")),
            PathBuf::from("/tmp/shots/cat_trimap.png")
        );
    }

    #[test]
    fn sidecars_are_recognised() {
        assert!(is_trimap_sidecar(Path::new("shots/cat_trimap.png")));
        assert!(is_trimap_sidecar(&default_trimap_path(Path::new("dog.webp"))));
        assert!(!is_trimap_sidecar(Path::new("shots/cat.png")));
        assert!(!is_trimap_sidecar(Path::new("shots/trimap_cat.png")));
    }

    #[test]
    fn mismatched_trimap_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!("trimap-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seed.png");
        save_trimap(&GrayImage::new(4, 4), &path).unwrap();
        assert!(load_trimap(&path, 4, 4).is_ok());
        assert!(matches!(
            load_trimap(&path, 5, 4),
            Err(TrimapError::DimensionMismatch { .. })
        ));
        let _ = std::fs::remove_dir_all(dir);
    }
}
