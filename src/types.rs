use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "jpeg", "jpg", "png", "pnm", "tga", "tif", "tiff", "webp",
];

// Annotation file extension
pub const ANNOTATION_EXTENSION: &str = "xml";

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Pixel dimensions of an image, width first.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Grid layout as columns x rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub cells_x: usize,
    pub cells_y: usize,
}

impl GridShape {
    pub fn new(cells_x: usize, cells_y: usize) -> Self {
        Self { cells_x, cells_y }
    }
}

/// Box corners in target-image pixel coordinates.
///
/// `xmin <= xmax` and `ymin <= ymax` are expected but not checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }
}

// A single labelled box belonging to one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedObject {
    pub class_name: String,
    pub bbox: BoundingBox,
}

/// The annotation file and image file that make up one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub annotation_path: PathBuf,
    pub image_path: PathBuf,
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub annotation_files: usize,
    pub objects: usize,
    pub images_written: usize,
    pub batches_written: usize,
    pub images_dropped: usize,
    pub clamped_centers: usize,
    pub overwritten_cells: usize,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Annotation files parsed: {}", self.annotation_files);
        log::info!("Objects encoded: {}", self.objects);
        log::info!("Images written: {}", self.images_written);
        log::info!("Batches written: {}", self.batches_written);

        if self.images_dropped > 0 {
            log::warn!(
                "Dropped {} trailing image(s) that did not fill a batch",
                self.images_dropped
            );
        }
        if self.clamped_centers > 0 {
            log::warn!(
                "Clamped {} object center(s) lying on or past the image edge",
                self.clamped_centers
            );
        }
        if self.overwritten_cells > 0 {
            log::warn!(
                "{} object(s) were overwritten by a later object in the same cell",
                self.overwritten_cells
            );
        }
    }
}
