// ============================================================================
// trimap-editor CLI: headless trimap normalisation and previews
// ============================================================================
//
// Usage examples:
//   trimap-editor --input cat.jpg --trimap cat_seed.png --output cat_trimap.png
//   trimap-editor -i cat.jpg --fill-unknown 10,10 --fill-foreground 200,150
//   trimap-editor -i "shots/*.jpg" --output-dir trimaps/
//   trimap-editor -i cat.jpg -t seed.png --preview cut.png --render cutout --layer foreground
//
// No window is opened. Every file goes through the same EditorSession the
// GUI uses, so fills and the codec behave identically.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use trimap_editor::viewport::{Point, Size};
use trimap_editor::{EditorSession, EditorSettings, LayerKind, ViewMode};

use crate::io;

#[derive(Parser, Debug)]
#[command(
    name = "trimap-editor",
    about = "Trimap editor: headless normalisation and previews",
    long_about = "Load an image and an optional seed trimap, apply flood fills, and\n\
                  write the normalised 0/128/255 trimap and/or a rendered view.\n\n\
                  Example:\n  \
                  trimap-editor --input cat.jpg --trimap seed.png --output cat_trimap.png"
)]
pub struct CliArgs {
    /// Input image(s). Glob patterns accepted (e.g. "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Seed trimap for a single input. With several inputs, a file named
    /// `<stem>_trimap.png` next to each image is used when present.
    #[arg(short, long, value_name = "FILE")]
    pub trimap: Option<PathBuf>,

    /// Output trimap path. Only valid for a single input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write a rendered view here (single input only).
    #[arg(long, value_name = "FILE")]
    pub preview: Option<PathBuf>,

    /// View used for --preview.
    #[arg(long, value_enum, default_value_t = RenderMode::Normal)]
    pub render: RenderMode,

    /// Active layer for the cutout view.
    #[arg(long, value_enum, default_value_t = LayerArg::Unknown)]
    pub layer: LayerArg,

    /// Show the complement of the active layer in the cutout view.
    #[arg(long)]
    pub invert: bool,

    /// Flood-fill the unknown layer from an image pixel. Repeatable.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub fill_unknown: Vec<Point>,

    /// Flood-fill the foreground layer from an image pixel. Repeatable.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub fill_foreground: Vec<Point>,

    /// Print per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RenderMode {
    Normal,
    Trimap,
    Cutout,
}

impl From<RenderMode> for ViewMode {
    fn from(mode: RenderMode) -> Self {
        match mode {
            RenderMode::Normal => ViewMode::Normal,
            RenderMode::Trimap => ViewMode::Trimap,
            RenderMode::Cutout => ViewMode::Cutout,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LayerArg {
    Unknown,
    Foreground,
}

impl From<LayerArg> for LayerKind {
    fn from(layer: LayerArg) -> Self {
        match layer {
            LayerArg::Unknown => LayerKind::Unknown,
            LayerArg::Foreground => LayerKind::Foreground,
        }
    }
}

impl CliArgs {
    /// True when a CLI-mode flag is present in the process arguments. Used by
    /// `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a.starts_with("--input="))
    }
}

/// Run all CLI processing and return an exit code: success only when every
/// file succeeded.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        log::error!("no input files matched the given pattern(s)");
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 {
        if args.output.is_some() && args.output_dir.is_none() {
            log::error!(
                "{} input files given but --output takes a single path; use --output-dir",
                inputs.len()
            );
            return ExitCode::FAILURE;
        }
        if args.trimap.is_some() || args.preview.is_some() {
            log::error!("--trimap and --preview need a single input");
            return ExitCode::FAILURE;
        }
    }
    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        log::error!("could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let settings = EditorSettings::load();
    let total = inputs.len();
    let mut any_failure = false;

    for (idx, input) in inputs.iter().enumerate() {
        let start = Instant::now();
        if total > 1 || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input.display());
        }
        match run_one(input, &args, &settings) {
            Ok(output) => {
                if total > 1 || args.verbose {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output.display(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log::error!("{}: {:#}", input.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file pipeline
// ============================================================================

fn run_one(input: &Path, args: &CliArgs, settings: &EditorSettings) -> Result<PathBuf> {
    let image = io::load_image(input).with_context(|| format!("loading {}", input.display()))?;
    let (w, h) = image.dimensions();

    let mut session = EditorSession::new(settings.clone());
    session.set_viewport(Size::new(w as f32, h as f32));

    let seed_path = args.trimap.clone().or_else(|| {
        let candidate = io::default_trimap_path(input);
        candidate.exists().then_some(candidate)
    });
    let image = Arc::new(image);
    // An unreadable or mis-sized seed is not fatal; the masks start blank.
    match seed_path.map(|path| (io::load_trimap(&path, w, h), path)) {
        Some((Ok(masks), _)) => session.load_image_with_masks(image, masks),
        Some((Err(e), path)) => {
            log::warn!("ignoring trimap {}: {}", path.display(), e);
            session.load_image(image, None);
        }
        None => session.load_image(image, None),
    }

    for &seed in &args.fill_unknown {
        apply_fill(&mut session, LayerKind::Unknown, seed)?;
    }
    for &seed in &args.fill_foreground {
        apply_fill(&mut session, LayerKind::Foreground, seed)?;
    }

    let Some(export) = session.export() else {
        bail!("no image loaded");
    };
    let output = build_output_path(input, args.output.as_deref(), args.output_dir.as_deref())
        .context("cannot determine output path")?;
    io::save_trimap(&export.trimap, &output)?;

    if let Some(preview) = &args.preview {
        session.set_layer(args.layer.into());
        session.set_view_mode(args.render.into());
        if args.invert {
            session.toggle_invert();
        }
        let frame = session.render().clone();
        io::save_render(&frame, preview)
            .with_context(|| format!("writing preview {}", preview.display()))?;
    }
    Ok(output)
}

fn apply_fill(session: &mut EditorSession, layer: LayerKind, seed: Point) -> Result<()> {
    let (w, h) = session.image_size().unwrap_or((0, 0));
    if seed.x < 0.0 || seed.y < 0.0 || seed.x >= w as f32 || seed.y >= h as f32 {
        bail!("fill seed {},{} is outside the {}x{} image", seed.x, seed.y, w, h);
    }
    // Pixel centre, so the seed names the pixel exactly.
    let result = session.fill(layer, Point::new(seed.x.floor() + 0.5, seed.y.floor() + 0.5));
    log::info!("{} fill at {},{}: {} px", layer.label(), seed.x, seed.y, result.filled);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
    let x: f32 = x.trim().parse().map_err(|e| format!("bad X in '{s}': {e}"))?;
    let y: f32 = y.trim().parse().map_err(|e| format!("bad Y in '{s}': {e}"))?;
    Ok(Point::new(x, y))
}

/// Literal paths and glob matches, first occurrence wins.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    patterns
        .iter()
        .flat_map(|pattern| expand_pattern(pattern))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// An existing path is taken as given. Glob matches skip directories and
/// `<stem>_trimap.png` sidecars, so a batch never re-reads its own outputs.
fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let literal = Path::new(pattern);
    if literal.exists() {
        return vec![literal.to_path_buf()];
    }
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("invalid glob '{}': {}", pattern, e);
            return Vec::new();
        }
    };
    let matched: Vec<PathBuf> = entries
        .flatten()
        .filter(|path| path.is_file() && !io::is_trimap_sidecar(path))
        .collect();
    if matched.is_empty() {
        log::warn!("pattern '{}' matched no images", pattern);
    }
    matched
}

/// Output path for one input:
/// 1. `--output`
/// 2. `--output-dir/<stem>_trimap.png`
/// 3. `<stem>_trimap.png` next to the input
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let name = io::default_trimap_path(input).file_name()?.to_owned();
    match output_dir {
        Some(dir) => Some(dir.join(name)),
        None => Some(io::default_trimap_path(input)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    /// A fresh scratch directory for one test.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trimap-cli-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn args(argv: &[&str]) -> CliArgs {
        let mut full = vec!["trimap-editor"];
        full.extend_from_slice(argv);
        CliArgs::try_parse_from(full).unwrap()
    }

    #[test]
    fn parses_fill_points() {
        assert_eq!(parse_point("10,20").unwrap(), Point::new(10.0, 20.0));
        assert_eq!(parse_point(" 3 , 4.5 ").unwrap(), Point::new(3.0, 4.5));
        assert!(parse_point("10").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn args_parse_repeated_fills() {
        let args = CliArgs::try_parse_from([
            "trimap-editor",
            "-i",
            "cat.jpg",
            "--fill-unknown",
            "1,2",
            "--fill-unknown",
            "3,4",
            "--render",
            "cutout",
            "--layer",
            "foreground",
        ])
        .unwrap();
        assert_eq!(args.fill_unknown.len(), 2);
        assert_eq!(args.render, RenderMode::Cutout);
        assert_eq!(LayerKind::from(args.layer), LayerKind::Foreground);
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("/data/cat.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), None),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("/out"))),
            Some(PathBuf::from("/out/cat_trimap.png"))
        );
        assert_eq!(
            build_output_path(input, None, None),
            Some(PathBuf::from("/data/cat_trimap.png"))
        );
    }

    #[test]
    fn mis_sized_sidecar_starts_blank() {
        let dir = scratch("sidecar");
        let input = dir.join("cat.png");
        RgbaImage::new(4, 4).save(&input).unwrap();
        let mut stale = GrayImage::new(3, 3);
        stale.put_pixel(1, 1, Luma([255]));
        io::save_trimap(&stale, &dir.join("cat_trimap.png")).unwrap();

        let a = args(&["-i", input.to_str().unwrap()]);
        let output = run_one(&input, &a, &EditorSettings::default()).unwrap();
        assert_eq!(output, dir.join("cat_trimap.png"));

        let written = image::open(&output).unwrap().to_luma8();
        assert_eq!(written.dimensions(), (4, 4));
        assert!(written.pixels().all(|p| p[0] == 0));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn seed_fill_output_and_preview() {
        let dir = scratch("pipeline");
        let input = dir.join("dog.png");
        RgbaImage::from_pixel(6, 4, Rgba([200, 40, 40, 255])).save(&input).unwrap();

        // Foreground wall down column 2 splits the image in two.
        let mut seed = GrayImage::new(6, 4);
        for y in 0..4 {
            seed.put_pixel(2, y, Luma([255]));
        }
        let seed_path = dir.join("seed.png");
        io::save_trimap(&seed, &seed_path).unwrap();

        let out = dir.join("out.png");
        let preview = dir.join("preview.png");
        let a = args(&[
            "-i",
            input.to_str().unwrap(),
            "-t",
            seed_path.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            // Fractional seed snaps to pixel (4, 1), right of the wall.
            "--fill-unknown",
            "4.9,1.2",
            "--fill-foreground",
            "1,3",
            "--preview",
            preview.to_str().unwrap(),
            "--render",
            "trimap",
        ]);
        assert_eq!(run_one(&input, &a, &EditorSettings::default()).unwrap(), out);

        let trimap = image::open(&out).unwrap().to_luma8();
        assert_eq!(trimap.dimensions(), (6, 4));
        for y in 0..4 {
            for x in 0..3 {
                assert_eq!(trimap.get_pixel(x, y)[0], 255, "({x}, {y})");
            }
            for x in 3..6 {
                assert_eq!(trimap.get_pixel(x, y)[0], 128, "({x}, {y})");
            }
        }

        let frame = image::open(&preview).unwrap().to_rgba8();
        assert_eq!(frame.dimensions(), (6, 4));
        assert_eq!(frame.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(frame.get_pixel(3, 0).0, [128, 128, 128, 255]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn fill_outside_image_fails_the_file() {
        let dir = scratch("offimage");
        let input = dir.join("bird.png");
        RgbaImage::new(4, 4).save(&input).unwrap();
        let a = args(&["-i", input.to_str().unwrap(), "--fill-unknown", "4,0"]);
        assert!(run_one(&input, &a, &EditorSettings::default()).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn glob_skips_trimap_sidecars() {
        let dir = scratch("glob");
        for name in ["a.png", "a_trimap.png", "b.png"] {
            RgbaImage::new(2, 2).save(dir.join(name)).unwrap();
        }
        std::fs::create_dir_all(dir.join("nested.png")).unwrap();

        let pattern = dir.join("*.png").to_string_lossy().into_owned();
        let literal = dir.join("a_trimap.png").to_string_lossy().into_owned();
        let inputs = resolve_inputs(&[pattern.clone(), pattern]);
        assert_eq!(inputs, vec![dir.join("a.png"), dir.join("b.png")]);

        // Named explicitly, a sidecar is still an input.
        assert_eq!(resolve_inputs(&[literal]), vec![dir.join("a_trimap.png")]);
        let _ = std::fs::remove_dir_all(dir);
    }
}
