use glob::glob;
use image::imageops::FilterType;
use ndarray::Array3;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{get_image_extensions_set, ImageSize, SamplePair, ANNOTATION_EXTENSION};
use crate::utils::{file_stem, has_extension};
use crate::vocabulary::ClassVocabulary;

/// File name of the persisted class vocabulary.
pub const CLASS_NAMES_FILE: &str = "classnames.json";

/// Resized image pixels, shape `(height, width, 3)`.
pub type ImageArray = Array3<u8>;

fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "directory does not exist"),
        ));
    }

    let pattern = dir.join("*");
    let pattern = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| Error::InvalidConfig(format!("bad directory pattern {}: {}", pattern, e)))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file() && keep(path))
        .collect();
    files.sort();
    Ok(files)
}

/// List the annotation files of a directory in sorted path order.
pub fn list_annotation_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list_files(dir, |path| has_extension(path, ANNOTATION_EXTENSION))
}

/// List the image files of a directory in sorted path order.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let extensions = get_image_extensions_set();
    list_files(dir, |path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext.to_lowercase()))
    })
}

fn sort_by_stem(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| (file_stem(path), path.clone()));
}

/// Pair annotation and image files by file stem.
///
/// Both lists are ordered by stem before pairing, so the extension never
/// affects which files end up side by side. Every pair must share its stem.
pub fn pair_samples(
    mut annotations: Vec<PathBuf>,
    mut images: Vec<PathBuf>,
) -> Result<Vec<SamplePair>> {
    if annotations.len() != images.len() {
        return Err(Error::IndexMismatch {
            reason: format!(
                "found {} annotation file(s) but {} image file(s)",
                annotations.len(),
                images.len()
            ),
        });
    }
    sort_by_stem(&mut annotations);
    sort_by_stem(&mut images);

    annotations
        .into_iter()
        .zip(images)
        .enumerate()
        .map(|(index, (annotation_path, image_path))| {
            let annotation_stem = file_stem(&annotation_path);
            let image_stem = file_stem(&image_path);
            if annotation_stem != image_stem {
                return Err(Error::IndexMismatch {
                    reason: format!(
                        "entry {} pairs annotation '{}' with image '{}'",
                        index,
                        annotation_path.display(),
                        image_path.display()
                    ),
                });
            }
            Ok(SamplePair {
                annotation_path,
                image_path,
            })
        })
        .collect()
}

/// List both directories and pair their files in stem order.
pub fn discover_samples(annotations_dir: &Path, images_dir: &Path) -> Result<Vec<SamplePair>> {
    let annotations = list_annotation_files(annotations_dir)?;
    let images = list_image_files(images_dir)?;
    pair_samples(annotations, images)
}

/// Load an image, convert it to RGB and resize it to exactly `size`.
pub fn load_resized_image(path: &Path, size: ImageSize) -> Result<ImageArray> {
    let image = image::open(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let resized = image
        .resize_exact(size.width, size.height, FilterType::Lanczos3)
        .to_rgb8();

    let shape = (size.height as usize, size.width as usize, 3);
    Array3::from_shape_vec(shape, resized.into_raw()).map_err(|e| Error::Image {
        path: path.to_path_buf(),
        source: image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::Generic(e.to_string()),
        )),
    })
}

/// Load and resize several images in parallel, keeping the input order.
pub fn load_resized_images<P>(paths: &[P], size: ImageSize) -> Result<Vec<ImageArray>>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| load_resized_image(path.as_ref(), size))
        .collect()
}

/// Write the class vocabulary as a JSON array of names.
pub fn write_class_names(output_dir: &Path, vocabulary: &ClassVocabulary) -> Result<PathBuf> {
    let path = output_dir.join(CLASS_NAMES_FILE);
    let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, vocabulary).map_err(|e| Error::Serialize {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    writer.write_all(b"\n").map_err(|e| Error::io(&path, e))?;
    writer.flush().map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

/// Read a vocabulary written by [`write_class_names`].
pub fn read_class_names(path: &Path) -> Result<ClassVocabulary> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(file).map_err(|e| Error::Serialize {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Create the output directory, removing batch files left by an earlier run.
pub fn prepare_output_directory(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;

    let pattern = output_dir.join("batch_*.bin");
    let stale: Vec<PathBuf> = glob(&pattern.to_string_lossy())
        .map_err(|e| Error::InvalidConfig(format!("bad output pattern: {}", e)))?
        .filter_map(|entry| entry.ok())
        .collect();
    if !stale.is_empty() {
        log::warn!(
            "Removing {} batch file(s) from a previous run in {:?}",
            stale.len(),
            output_dir
        );
    }
    for path in stale {
        fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
    }
    Ok(())
}
