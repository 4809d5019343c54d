use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{GridShape, ImageSize};

/// Command-line arguments for converting a Pascal VOC dataset into grid target batches.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing the VOC XML annotation files
    #[arg(long = "annotations_dir", default_value = "dataset/annotations")]
    pub annotations_dir: PathBuf,

    /// Directory containing the images, one per annotation file
    #[arg(long = "images_dir", default_value = "dataset/images")]
    pub images_dir: PathBuf,

    /// Directory the batch files and class names are written to
    #[arg(long = "output_dir", default_value = "processed_data")]
    pub output_dir: PathBuf,

    /// Target image width in pixels
    #[arg(long = "width", value_parser = validate_positive::<u32>)]
    pub width: u32,

    /// Target image height in pixels
    #[arg(long = "height", value_parser = validate_positive::<u32>)]
    pub height: u32,

    /// Number of grid columns
    #[arg(long = "cells_x", value_parser = validate_positive::<usize>)]
    pub cells_x: usize,

    /// Number of grid rows
    #[arg(long = "cells_y", value_parser = validate_positive::<usize>)]
    pub cells_y: usize,

    /// Number of images per batch file; a trailing partial batch is dropped
    #[arg(long = "batch_size", value_parser = validate_positive::<usize>)]
    pub batch_size: usize,

    /// What to do with an object whose center falls outside the grid
    #[arg(long = "cell_policy", value_enum, default_value = "clamp")]
    pub cell_policy: CellPolicy,

    /// How many one-hot class slots are written per cell
    #[arg(long = "class_slots", value_enum, default_value = "truncated")]
    pub class_slots: ClassSlots,
}

/// Handling of box centers whose cell index falls outside the grid,
/// e.g. a center lying exactly on the right or bottom image edge.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CellPolicy {
    /// Move the center into the nearest edge cell
    #[default]
    Clamp,
    /// Fail the run
    Reject,
}

/// Number of class one-hot slots written into each occupied cell.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum ClassSlots {
    /// Write the first `num_classes - 1` slots, leaving the last class slot at zero
    #[default]
    Truncated,
    /// Write all `num_classes` slots
    Full,
}

impl ClassSlots {
    pub fn count(self, num_classes: usize) -> usize {
        match self {
            ClassSlots::Truncated => num_classes.saturating_sub(1),
            ClassSlots::Full => num_classes,
        }
    }
}

/// Encoding parameters shared by the encoder and the batch writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingConfig {
    pub image_size: ImageSize,
    pub grid: GridShape,
    pub cell_policy: CellPolicy,
    pub class_slots: ClassSlots,
}

impl EncodingConfig {
    pub fn new(image_size: ImageSize, grid: GridShape) -> Self {
        Self {
            image_size,
            grid,
            cell_policy: CellPolicy::default(),
            class_slots: ClassSlots::default(),
        }
    }

    pub fn with_cell_policy(mut self, cell_policy: CellPolicy) -> Self {
        self.cell_policy = cell_policy;
        self
    }

    pub fn with_class_slots(mut self, class_slots: ClassSlots) -> Self {
        self.class_slots = class_slots;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_size.width == 0 || self.image_size.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "image size must be positive, got {}x{}",
                self.image_size.width, self.image_size.height
            )));
        }
        if self.grid.cells_x == 0 || self.grid.cells_y == 0 {
            return Err(Error::InvalidConfig(format!(
                "grid must have at least one cell, got {}x{}",
                self.grid.cells_x, self.grid.cells_y
            )));
        }
        Ok(())
    }
}

/// Everything one conversion run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub annotations_dir: PathBuf,
    pub images_dir: PathBuf,
    pub output_dir: PathBuf,
    pub encoding: EncodingConfig,
    pub batch_size: usize,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.encoding.validate()?;
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Args {
    /// Convert the parsed arguments into a validated pipeline configuration.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig> {
        let encoding = EncodingConfig::new(
            ImageSize::new(self.width, self.height),
            GridShape::new(self.cells_x, self.cells_y),
        )
        .with_cell_policy(self.cell_policy)
        .with_class_slots(self.class_slots);

        let config = PipelineConfig {
            annotations_dir: self.annotations_dir.clone(),
            images_dir: self.images_dir.clone(),
            output_dir: self.output_dir.clone(),
            encoding,
            batch_size: self.batch_size,
        };
        config.validate()?;
        Ok(config)
    }
}

// Validate that a count or dimension is a positive integer
pub fn validate_positive<T>(s: &str) -> std::result::Result<T, String>
where
    T: FromStr + PartialOrd + Default,
{
    match T::from_str(s) {
        Ok(val) if val > T::default() => Ok(val),
        _ => Err("value must be a positive integer".to_string()),
    }
}
