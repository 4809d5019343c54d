use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

use voc2grid::batch::read_batch;
use voc2grid::io::{discover_samples, load_resized_image, read_class_names, CLASS_NAMES_FILE};
use voc2grid::{
    process_dataset, Batch, BatchWriter, ClassVocabulary, EncodingConfig, Error, GridEncoder, GridShape,
    ImageSize, PipelineConfig,
};

fn write_annotation(dir: &Path, stem: &str, width: u32, height: u32, objects: &[(&str, [u32; 4])]) {
    let mut xml = format!(
        "<annotation>\n  <filename>{}.png</filename>\n  <size>\n    <width>{}</width>\n    \
         <height>{}</height>\n    <depth>3</depth>\n  </size>\n",
        stem, width, height
    );
    for (name, [xmin, ymin, xmax, ymax]) in objects {
        xml.push_str(&format!(
            "  <object>\n    <name>{}</name>\n    <bndbox>\n      <xmin>{}</xmin>\n      \
             <ymin>{}</ymin>\n      <xmax>{}</xmax>\n      <ymax>{}</ymax>\n    </bndbox>\n  </object>\n",
            name, xmin, ymin, xmax, ymax
        ));
    }
    xml.push_str("</annotation>\n");
    fs::write(dir.join(format!("{}.xml", stem)), xml).unwrap();
}

fn write_image(dir: &Path, stem: &str, width: u32, height: u32) {
    let image = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    image.save(dir.join(format!("{}.png", stem))).unwrap();
}

struct Fixture {
    _root: tempfile::TempDir,
    config: PipelineConfig,
}

fn fixture(image_count: usize, batch_size: usize) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let annotations_dir = root.path().join("annotations");
    let images_dir = root.path().join("images");
    fs::create_dir_all(&annotations_dir).unwrap();
    fs::create_dir_all(&images_dir).unwrap();

    for index in 0..image_count {
        let stem = format!("{:04}", index);
        let class_name = if index % 2 == 0 { "dog" } else { "cat" };
        write_annotation(
            &annotations_dir,
            &stem,
            64,
            32,
            &[(class_name, [8, 4, 24, 20]), ("person", [40, 10, 60, 30])],
        );
        write_image(&images_dir, &stem, 64, 32);
    }

    let config = PipelineConfig {
        annotations_dir,
        images_dir,
        output_dir: root.path().join("processed_data"),
        encoding: EncodingConfig::new(ImageSize::new(32, 32), GridShape::new(4, 4)),
        batch_size,
    };
    Fixture {
        _root: root,
        config,
    }
}

#[test]
fn test_process_dataset_writes_full_batches_only() {
    let fixture = fixture(5, 2);
    let stats = process_dataset(&fixture.config).unwrap();

    assert_eq!(stats.annotation_files, 5);
    assert_eq!(stats.objects, 10);
    assert_eq!(stats.batches_written, 2);
    assert_eq!(stats.images_written, 4);
    assert_eq!(stats.images_dropped, 1);

    let output_dir = &fixture.config.output_dir;
    assert!(output_dir.join("batch_0.bin").exists());
    assert!(output_dir.join("batch_1.bin").exists());
    assert!(!output_dir.join("batch_2.bin").exists());

    let vocabulary = read_class_names(&output_dir.join(CLASS_NAMES_FILE)).unwrap();
    assert_eq!(vocabulary.names(), &["cat", "dog", "person"]);

    let batch = read_batch(&output_dir.join("batch_1.bin")).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.images.shape(), &[2, 32, 32, 3]);
    assert_eq!(batch.targets.shape(), &[2, 4, 4, 7]);
}

#[test]
fn test_batch_targets_match_direct_encoding() {
    let fixture = fixture(2, 2);
    process_dataset(&fixture.config).unwrap();
    let batch = read_batch(&fixture.config.output_dir.join("batch_0.bin")).unwrap();

    // 0000.xml: dog at [8,4,24,20] on a 64x32 image, rescaled to 32x32
    let vocabulary = ClassVocabulary::from_names(["cat", "dog", "person"]);
    let encoder = GridEncoder::new(fixture.config.encoding, &vocabulary).unwrap();
    let expected = encoder
        .encode(
            &voc2grid::load_annotation(
                &fixture.config.annotations_dir.join("0000.xml"),
                fixture.config.encoding.image_size,
            )
            .unwrap()
            .objects,
        )
        .unwrap();
    assert_eq!(batch.targets.index_axis(ndarray::Axis(0), 0), expected);

    // dog box rescales to [4,4,12,20], center (8, 12) -> cell (1, 1) with 8 px cells
    assert_eq!(batch.targets[[0, 1, 1, 0]], 0.0);
    assert_eq!(batch.targets[[0, 1, 1, 1]], 1.0);
}

#[test]
fn test_rerun_removes_stale_batches() {
    let fixture = fixture(4, 1);
    process_dataset(&fixture.config).unwrap();
    assert!(fixture.config.output_dir.join("batch_3.bin").exists());

    let mut config = fixture.config.clone();
    config.batch_size = 2;
    let stats = process_dataset(&config).unwrap();

    assert_eq!(stats.batches_written, 2);
    assert!(!config.output_dir.join("batch_2.bin").exists());
    assert!(!config.output_dir.join("batch_3.bin").exists());
}

#[test]
fn test_mismatched_directories_abort() {
    let fixture = fixture(3, 1);
    fs::remove_file(fixture.config.images_dir.join("0001.png")).unwrap();
    write_image(&fixture.config.images_dir, "9999", 8, 8);

    let result = discover_samples(&fixture.config.annotations_dir, &fixture.config.images_dir);
    assert!(matches!(result, Err(Error::IndexMismatch { .. })));
    assert!(matches!(
        process_dataset(&fixture.config),
        Err(Error::IndexMismatch { .. })
    ));
}

#[test]
fn test_malformed_annotation_aborts_run() {
    let fixture = fixture(2, 1);
    fs::write(
        fixture.config.annotations_dir.join("0001.xml"),
        "<annotation><size><width>64</width>",
    )
    .unwrap();

    assert!(matches!(
        process_dataset(&fixture.config),
        Err(Error::Parse { .. })
    ));
}

#[test]
fn test_load_resized_image_shape() {
    let root = tempfile::tempdir().unwrap();
    write_image(root.path(), "wide", 40, 10);
    let image = load_resized_image(&root.path().join("wide.png"), ImageSize::new(20, 30)).unwrap();

    assert_eq!(image.shape(), &[30, 20, 3]);
}

#[test]
fn test_batch_writer_rejects_zero_batch_size() {
    let root = tempfile::tempdir().unwrap();
    assert!(matches!(
        BatchWriter::new(root.path(), 0),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_batch_writer_write_all() {
    let root = tempfile::tempdir().unwrap();
    let writer = BatchWriter::new(root.path(), 2).unwrap();
    let images: Vec<_> = (0..5).map(|_| ndarray::Array3::<u8>::zeros((4, 4, 3))).collect();
    let targets: Vec<_> = (0..5).map(|_| ndarray::Array3::<f32>::zeros((2, 2, 5))).collect();

    let paths = writer.write_all(&images, &targets).unwrap();
    assert_eq!(paths, vec![writer.batch_path(0), writer.batch_path(1)]);
    assert!(writer.write_all(&images, &targets[..4]).is_err());
}

#[cfg(target_os = "linux")]
#[test]
fn test_batch_write_reports_flush_failure() {
    let full = Path::new("/dev/full");
    if !full.exists() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let writer = BatchWriter::new(root.path(), 1).unwrap();
    std::os::unix::fs::symlink(full, writer.batch_path(0)).unwrap();

    let batch = Batch::from_samples(
        &[ndarray::Array3::<u8>::zeros((2, 2, 3))],
        &[ndarray::Array3::<f32>::zeros((2, 2, 5))],
    )
    .unwrap();
    assert!(matches!(writer.write(0, &batch), Err(Error::Io { .. })));
}
