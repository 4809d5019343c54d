use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use std::path::Path;

use crate::batch::{batch_count, Batch, BatchWriter};
use crate::config::PipelineConfig;
use crate::encoder::{EncodeStats, GridEncoder, GridTarget};
use crate::error::Result;
use crate::io::{discover_samples, load_resized_images, prepare_output_directory, write_class_names};
use crate::types::ConversionStats;
use crate::utils::create_progress_bar;
use crate::voc::{load_annotations, ImageObjects};
use crate::vocabulary::ClassVocabulary;

/// Encode every image's objects, keeping the input order.
pub fn encode_targets(
    encoder: &GridEncoder<'_>,
    images: &[ImageObjects],
    pb: &ProgressBar,
) -> Result<(Vec<GridTarget>, EncodeStats)> {
    let encoded = images
        .par_iter()
        .map(|image| {
            let encoded = encoder.encode_with_stats(&image.objects);
            pb.inc(1);
            encoded
        })
        .collect::<Result<Vec<_>>>()?;

    let mut stats = EncodeStats::default();
    let targets = encoded
        .into_iter()
        .map(|(target, image_stats)| {
            stats.merge(image_stats);
            target
        })
        .collect();
    Ok((targets, stats))
}

/// Main dataset processing pipeline.
///
/// Annotations are parsed and encoded for the whole corpus, the vocabulary is
/// written, then images are loaded one batch at a time and written alongside
/// their targets.
pub fn process_dataset(config: &PipelineConfig) -> Result<ConversionStats> {
    config.validate()?;
    let mut stats = ConversionStats::new();
    let target_size = config.encoding.image_size;

    let samples = discover_samples(&config.annotations_dir, &config.images_dir)?;
    info!("Found {} annotated image(s).", samples.len());
    prepare_output_directory(&config.output_dir)?;

    info!("Reading annotation files...");
    let annotation_paths: Vec<&Path> = samples
        .iter()
        .map(|sample| sample.annotation_path.as_path())
        .collect();
    let pb = create_progress_bar(annotation_paths.len() as u64, "Annotations");
    let annotations = load_annotations(&annotation_paths, target_size, &pb)?;
    pb.finish_with_message("Annotations parsed");
    stats.annotation_files = annotations.images.len();

    let vocabulary = ClassVocabulary::from_names(&annotations.class_names);
    info!(
        "Found {} object(s) across {} class(es).",
        annotations.object_count(),
        vocabulary.len()
    );
    if vocabulary.is_empty() {
        warn!("No objects found; every target will be empty.");
    }

    info!("Creating target tensors...");
    let encoder = GridEncoder::new(config.encoding, &vocabulary)?;
    let pb = create_progress_bar(annotations.images.len() as u64, "Targets");
    let (targets, encode_stats) = encode_targets(&encoder, &annotations.images, &pb)?;
    pb.finish_with_message("Targets encoded");
    stats.objects = encode_stats.objects;
    stats.clamped_centers = encode_stats.clamped_centers;
    stats.overwritten_cells = encode_stats.overwritten_cells;

    let class_names_path = write_class_names(&config.output_dir, &vocabulary)?;
    info!("Wrote {}", class_names_path.display());

    info!("Creating batch files...");
    let writer = BatchWriter::new(&config.output_dir, config.batch_size)?;
    let (full_batches, remainder) = batch_count(samples.len(), config.batch_size);
    let pb = create_progress_bar(full_batches as u64, "Batches");
    for (index, (sample_chunk, target_chunk)) in samples
        .chunks_exact(config.batch_size)
        .zip(targets.chunks_exact(config.batch_size))
        .enumerate()
    {
        let image_paths: Vec<&Path> = sample_chunk
            .iter()
            .map(|sample| sample.image_path.as_path())
            .collect();
        let images = load_resized_images(&image_paths, target_size)?;
        let batch = Batch::from_samples(&images, target_chunk)?;
        writer.write(index, &batch)?;
        stats.batches_written += 1;
        stats.images_written += batch.len();
        pb.inc(1);
    }
    pb.finish_with_message("Batches written");
    stats.images_dropped = remainder;

    stats.print_summary();
    info!("Conversion process completed successfully.");
    Ok(stats)
}
