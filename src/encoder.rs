//! Grid target encoding.
//!
//! Each image is divided into `cells_x` x `cells_y` cells and every object is
//! assigned to the cell containing its box center. The target tensor has
//! shape `(cells_x, cells_y, num_classes + 4)` and is indexed
//! `[column, row, slot]`. An occupied cell holds the class one-hot in its
//! leading slots followed by
//! `[distance_x, distance_y, width, height]` in slots
//! `num_classes..num_classes + 4`, where the distances are the signed offset
//! of the box center from the cell center and all four values are normalized
//! by the image size.
//!
//! A cell holds at most one object; a later object in the same cell replaces
//! the earlier one.

use log::debug;
use ndarray::{s, Array2, Array3};

use crate::config::{CellPolicy, EncodingConfig};
use crate::error::{Error, Result};
use crate::types::AnnotatedObject;
use crate::vocabulary::ClassVocabulary;

/// Encoded target tensor of one image, shape `(cells_x, cells_y, num_classes + 4)`.
pub type GridTarget = Array3<f32>;

/// Number of box values stored after the class slots.
pub const BOX_SLOTS: usize = 4;

/// Cell an object was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellIndex {
    pub column: usize,
    pub row: usize,
    /// Whether the raw index fell outside the grid and was moved to the edge.
    pub clamped: bool,
}

/// Per-image counters, folded into the run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncodeStats {
    pub objects: usize,
    pub clamped_centers: usize,
    pub overwritten_cells: usize,
}

impl EncodeStats {
    pub fn merge(&mut self, other: EncodeStats) {
        self.objects += other.objects;
        self.clamped_centers += other.clamped_centers;
        self.overwritten_cells += other.overwritten_cells;
    }
}

/// Encodes per-image object lists into grid targets for a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct GridEncoder<'a> {
    config: EncodingConfig,
    vocabulary: &'a ClassVocabulary,
    class_vectors: Array2<f32>,
}

// Index along one axis; the flag is set when `coord` lies outside `[0, extent)`.
// The division runs in f64 so a coordinate just below the edge stays in the last cell.
fn grid_index(coord: f32, extent: u32, cells: usize) -> (usize, bool) {
    let coord = coord as f64;
    let extent = extent as f64;
    if coord.is_nan() || coord < 0.0 {
        return (0, true);
    }
    if coord >= extent {
        return (cells - 1, true);
    }
    let index = (coord * cells as f64 / extent).floor() as usize;
    (index.min(cells - 1), false)
}

impl<'a> GridEncoder<'a> {
    pub fn new(config: EncodingConfig, vocabulary: &'a ClassVocabulary) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            vocabulary,
            class_vectors: vocabulary.one_hot_matrix(),
        })
    }

    pub fn config(&self) -> &EncodingConfig {
        &self.config
    }

    pub fn num_classes(&self) -> usize {
        self.vocabulary.len()
    }

    /// Length of the per-cell vector.
    pub fn depth(&self) -> usize {
        self.num_classes() + BOX_SLOTS
    }

    pub fn target_shape(&self) -> (usize, usize, usize) {
        (self.config.grid.cells_x, self.config.grid.cells_y, self.depth())
    }

    /// Width and height of one cell in pixels.
    pub fn cell_size(&self) -> (f32, f32) {
        (
            self.config.image_size.width as f32 / self.config.grid.cells_x as f32,
            self.config.image_size.height as f32 / self.config.grid.cells_y as f32,
        )
    }

    /// Cell containing the point `(cx, cy)`.
    ///
    /// Centers outside the image, including one lying exactly on the right or
    /// bottom edge, are clamped to the nearest edge cell.
    pub fn cell_for_center(&self, cx: f32, cy: f32) -> CellIndex {
        let size = self.config.image_size;
        let (column, column_clamped) = grid_index(cx, size.width, self.config.grid.cells_x);
        let (row, row_clamped) = grid_index(cy, size.height, self.config.grid.cells_y);
        CellIndex {
            column,
            row,
            clamped: column_clamped || row_clamped,
        }
    }

    pub fn encode(&self, objects: &[AnnotatedObject]) -> Result<GridTarget> {
        self.encode_with_stats(objects).map(|(target, _)| target)
    }

    /// Encode one image's objects and report clamping and overwrites.
    pub fn encode_with_stats(&self, objects: &[AnnotatedObject]) -> Result<(GridTarget, EncodeStats)> {
        let num_classes = self.num_classes();
        let class_slots = self.config.class_slots.count(num_classes);
        let image_width = self.config.image_size.width as f32;
        let image_height = self.config.image_size.height as f32;
        let (cell_width, cell_height) = self.cell_size();

        let mut target = GridTarget::zeros(self.target_shape());
        let mut occupied = Array2::from_elem((self.config.grid.cells_x, self.config.grid.cells_y), false);
        let mut stats = EncodeStats::default();

        for object in objects {
            let class_index = self
                .vocabulary
                .index_of(&object.class_name)
                .ok_or_else(|| Error::UnknownClass(object.class_name.clone()))?;

            let (cx, cy) = object.bbox.center();
            let cell = self.cell_for_center(cx, cy);
            if cell.clamped {
                if self.config.cell_policy == CellPolicy::Reject {
                    return Err(Error::CenterOutOfBounds {
                        class_name: object.class_name.clone(),
                        cx,
                        cy,
                        width: self.config.image_size.width,
                        height: self.config.image_size.height,
                    });
                }
                debug!(
                    "Clamped center ({}, {}) of '{}' into cell ({}, {})",
                    cx, cy, object.class_name, cell.column, cell.row
                );
                stats.clamped_centers += 1;
            }

            let cell_center_x = (cell.column as f32 + 0.5) * cell_width;
            let cell_center_y = (cell.row as f32 + 0.5) * cell_height;
            let values = [
                (cx - cell_center_x) / image_width,
                (cy - cell_center_y) / image_height,
                object.bbox.width() / image_width,
                object.bbox.height() / image_height,
            ];

            if occupied[[cell.column, cell.row]] {
                stats.overwritten_cells += 1;
            }
            occupied[[cell.column, cell.row]] = true;

            let mut cell_values = target.slice_mut(s![cell.column, cell.row, ..]);
            cell_values.fill(0.0);
            cell_values
                .slice_mut(s![..class_slots])
                .assign(&self.class_vectors.slice(s![class_index, ..class_slots]));
            for (offset, value) in values.into_iter().enumerate() {
                cell_values[num_classes + offset] = value;
            }
            stats.objects += 1;
        }

        Ok((target, stats))
    }
}
