use std::path::PathBuf;

/// Errors raised while converting a VOC dataset into grid targets.
///
/// Any of these aborts the run; nothing is retried or skipped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed annotation markup in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_xml_rs::Error,
    },

    #[error("missing required element '{field}' in {}", .path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("invalid value {text:?} for '{field}' in {}", .path.display())]
    Value {
        path: PathBuf,
        field: &'static str,
        text: String,
    },

    #[error("image and annotation listings do not line up: {reason}")]
    IndexMismatch { reason: String },

    #[error("failed to decode image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to serialize {}: {reason}", .path.display())]
    Serialize { path: PathBuf, reason: String },

    #[error(
        "object center ({cx}, {cy}) of class '{class_name}' lies outside the {width}x{height} image"
    )]
    CenterOutOfBounds {
        class_name: String,
        cx: f32,
        cy: f32,
        width: u32,
        height: u32,
    },

    #[error("class '{0}' is not part of the vocabulary")]
    UnknownClass(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
