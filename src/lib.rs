//! Pascal VOC to YOLO grid target converter
//!
//! This library turns a directory of VOC XML annotations and the matching
//! images into fixed-shape grid target tensors and writes them, together with
//! the resized images, as numbered batch files.

pub mod batch;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod io;
pub mod types;
pub mod utils;
pub mod voc;
pub mod vocabulary;

// Re-export commonly used types and functions
pub use batch::{read_batch, Batch, BatchWriter};
pub use config::{Args, CellPolicy, ClassSlots, EncodingConfig, PipelineConfig};
pub use dataset::process_dataset;
pub use encoder::{GridEncoder, GridTarget};
pub use error::{Error, Result};
pub use types::{AnnotatedObject, BoundingBox, ConversionStats, GridShape, ImageSize};
pub use voc::{load_annotation, parse_annotation};
pub use vocabulary::ClassVocabulary;
