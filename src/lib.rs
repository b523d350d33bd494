//! Raster mask editing engine for building trimaps over a photo.
//!
//! Two coupled 8-bit masks (`unknown` and `foreground`, with foreground
//! always inside unknown) are edited with a brush, an eraser and a bucket
//! fill, viewed through a zoomable and pannable viewport, and exported as a
//! single 0/128/255 grayscale raster. [`EditorSession`] is the entry point.

pub mod canvas;
pub mod codec;
pub mod components;
pub mod compositor;
pub mod error;
pub mod ops;
pub mod session;
pub mod settings;
pub mod viewport;

pub use canvas::{LayerKind, MaskLayer, MaskLayerStore, PixelState};
pub use components::history::HistoryManager;
pub use components::tools::Tool;
pub use compositor::{ViewCompositor, ViewMode, ViewOptions};
pub use error::TrimapError;
pub use session::{EditorSession, TrimapExport};
pub use settings::EditorSettings;
pub use viewport::{CoordinateMapper, Point, Size};
