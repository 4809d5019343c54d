//! Fixed-size batch records.
//!
//! A batch pairs `batch_size` resized images with their grid targets. Each
//! batch is written to its own `batch_{index}.bin` file as a bincode-encoded
//! [`Batch`].

use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::encoder::GridTarget;
use crate::error::{Error, Result};
use crate::io::ImageArray;

/// One persisted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Shape `(batch_size, height, width, 3)`.
    pub images: Array4<u8>,
    /// Shape `(batch_size, cells_x, cells_y, num_classes + 4)`.
    pub targets: Array4<f32>,
}

impl Batch {
    /// Stack paired images and targets into one batch.
    pub fn from_samples(images: &[ImageArray], targets: &[GridTarget]) -> Result<Self> {
        if images.len() != targets.len() {
            return Err(Error::IndexMismatch {
                reason: format!(
                    "batch has {} image(s) but {} target(s)",
                    images.len(),
                    targets.len()
                ),
            });
        }
        if images.is_empty() {
            return Err(Error::InvalidConfig("cannot build an empty batch".to_string()));
        }

        let image_views: Vec<_> = images.iter().map(|image| image.view()).collect();
        let target_views: Vec<_> = targets.iter().map(|target| target.view()).collect();
        let images = ndarray::stack(Axis(0), &image_views).map_err(|e| Error::IndexMismatch {
            reason: format!("images in one batch differ in shape: {}", e),
        })?;
        let targets = ndarray::stack(Axis(0), &target_views).map_err(|e| Error::IndexMismatch {
            reason: format!("targets in one batch differ in shape: {}", e),
        })?;

        Ok(Self { images, targets })
    }

    pub fn len(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of full batches and the count of samples left over.
pub fn batch_count(total: usize, batch_size: usize) -> (usize, usize) {
    if batch_size == 0 {
        return (0, total);
    }
    (total / batch_size, total % batch_size)
}

/// Writes numbered batch files into one directory.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    output_dir: PathBuf,
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(output_dir: impl Into<PathBuf>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            output_dir: output_dir.into(),
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batch_path(&self, index: usize) -> PathBuf {
        self.output_dir.join(format!("batch_{}.bin", index))
    }

    /// Persist one batch under `batch_{index}.bin`.
    pub fn write(&self, index: usize, batch: &Batch) -> Result<PathBuf> {
        let path = self.batch_path(index);
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, batch).map_err(|e| Error::Serialize {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        writer.flush().map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    /// Slice paired sequences into full batches and write each one.
    ///
    /// A trailing chunk shorter than the batch size is dropped. Returns the
    /// paths written.
    pub fn write_all(&self, images: &[ImageArray], targets: &[GridTarget]) -> Result<Vec<PathBuf>> {
        if images.len() != targets.len() {
            return Err(Error::IndexMismatch {
                reason: format!(
                    "{} image(s) but {} target(s)",
                    images.len(),
                    targets.len()
                ),
            });
        }

        images
            .chunks_exact(self.batch_size)
            .zip(targets.chunks_exact(self.batch_size))
            .enumerate()
            .map(|(index, (images, targets))| {
                let batch = Batch::from_samples(images, targets)?;
                self.write(index, &batch)
            })
            .collect()
    }
}

/// Read a batch file written by [`BatchWriter`].
pub fn read_batch(path: &Path) -> Result<Batch> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|e| Error::Serialize {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
