//! Pascal VOC annotation parsing.
//!
//! Every numeric field is read as text first so that a missing element and a
//! non-numeric one surface as different errors.

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{AnnotatedObject, BoundingBox, ImageSize};

#[derive(Debug, Default)]
struct VocAnnotation {
    size: Option<VocSize>,
    objects: Vec<VocObject>,
}

// `<object>` elements may be separated by other children of `<annotation>`,
// so each one is collected as it arrives instead of as one contiguous sequence.
impl<'de> Deserialize<'de> for VocAnnotation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AnnotationVisitor;

        impl<'de> Visitor<'de> for AnnotationVisitor {
            type Value = VocAnnotation;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a VOC annotation element")
            }

            fn visit_map<M>(self, mut map: M) -> std::result::Result<VocAnnotation, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut annotation = VocAnnotation::default();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "size" => {
                            if annotation.size.is_some() {
                                return Err(de::Error::duplicate_field("size"));
                            }
                            annotation.size = Some(map.next_value()?);
                        }
                        "object" => annotation.objects.push(map.next_value()?),
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(annotation)
            }
        }

        deserializer.deserialize_struct("annotation", &["size", "object"], AnnotationVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct VocSize {
    width: Option<String>,
    height: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VocObject {
    name: Option<String>,
    bndbox: Option<VocBndBox>,
}

#[derive(Debug, Deserialize)]
struct VocBndBox {
    xmin: Option<String>,
    ymin: Option<String>,
    xmax: Option<String>,
    ymax: Option<String>,
}

/// Objects of one image, rescaled to the target size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageObjects {
    pub original_size: ImageSize,
    pub objects: Vec<AnnotatedObject>,
}

impl ImageObjects {
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|object| object.class_name.as_str())
    }
}

/// Parsed annotation corpus: one object list per file, in input order.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    pub images: Vec<ImageObjects>,
    pub class_names: Vec<String>,
}

impl AnnotationSet {
    pub fn object_count(&self) -> usize {
        self.images.iter().map(|image| image.objects.len()).sum()
    }
}

fn required<T>(value: Option<T>, path: &Path, field: &'static str) -> Result<T> {
    value.ok_or_else(|| Error::MissingField {
        path: path.to_path_buf(),
        field,
    })
}

fn parse_number<T: std::str::FromStr>(text: &str, path: &Path, field: &'static str) -> Result<T> {
    text.trim().parse().map_err(|_| Error::Value {
        path: path.to_path_buf(),
        field,
        text: text.to_string(),
    })
}

fn parse_dimension(text: Option<String>, path: &Path, field: &'static str) -> Result<u32> {
    let text = required(text, path, field)?;
    match parse_number::<u32>(&text, path, field)? {
        0 => Err(Error::Value {
            path: path.to_path_buf(),
            field,
            text,
        }),
        value => Ok(value),
    }
}

fn parse_coordinate(text: Option<String>, path: &Path, field: &'static str) -> Result<f32> {
    let text = required(text, path, field)?;
    let value: f32 = parse_number(&text, path, field)?;
    if !value.is_finite() {
        return Err(Error::Value {
            path: path.to_path_buf(),
            field,
            text,
        });
    }
    Ok(value)
}

/// Parse annotation markup and rescale its boxes to `target`.
///
/// `path` only labels errors; nothing is read from disk.
pub fn parse_annotation(xml: &str, target: ImageSize, path: &Path) -> Result<ImageObjects> {
    let annotation: VocAnnotation = serde_xml_rs::from_str(xml).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let size = required(annotation.size, path, "size")?;
    let original = ImageSize::new(
        parse_dimension(size.width, path, "size/width")?,
        parse_dimension(size.height, path, "size/height")?,
    );
    let ratio_x = original.width as f32 / target.width as f32;
    let ratio_y = original.height as f32 / target.height as f32;

    let objects = annotation
        .objects
        .into_iter()
        .map(|object| {
            let class_name = required(object.name, path, "object/name")?;
            let bndbox = required(object.bndbox, path, "object/bndbox")?;
            let bbox = BoundingBox::new(
                parse_coordinate(bndbox.xmin, path, "bndbox/xmin")? / ratio_x,
                parse_coordinate(bndbox.ymin, path, "bndbox/ymin")? / ratio_y,
                parse_coordinate(bndbox.xmax, path, "bndbox/xmax")? / ratio_x,
                parse_coordinate(bndbox.ymax, path, "bndbox/ymax")? / ratio_y,
            );
            Ok(AnnotatedObject {
                class_name: class_name.trim().to_string(),
                bbox,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ImageObjects {
        original_size: original,
        objects,
    })
}

/// Read and parse a single annotation file.
pub fn load_annotation(path: &Path, target: ImageSize) -> Result<ImageObjects> {
    let xml = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_annotation(&xml, target, path)
}

/// Parse every annotation file, keeping the input order.
///
/// Files are parsed on the rayon pool; the first failure aborts the whole set.
pub fn load_annotations<P>(paths: &[P], target: ImageSize, pb: &ProgressBar) -> Result<AnnotationSet>
where
    P: AsRef<Path> + Sync,
{
    let images = paths
        .par_iter()
        .map(|path| {
            let parsed = load_annotation(path.as_ref(), target);
            pb.inc(1);
            parsed
        })
        .collect::<Result<Vec<_>>>()?;

    let class_names = images
        .iter()
        .flat_map(|image| image.class_names().map(str::to_string))
        .collect();

    Ok(AnnotationSet {
        images,
        class_names,
    })
}
