use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("label {0:?} is not in the label list")]
    UnknownLabel(String),

    #[error("label {0:?} appears more than once in the label list")]
    DuplicateLabel(String),

    #[error("invalid image size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("{shape_type} shape {label:?} has too few points ({points})")]
    MalformedShape {
        label: String,
        shape_type: String,
        points: usize,
    },

    #[error("no image found for annotation {}", .0.display())]
    MissingImage(PathBuf),

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize dataset manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] jwalk::Error),

    #[error("{}: {source}", .path.display())]
    Record {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn in_record(self, path: impl Into<PathBuf>) -> Self {
        Error::Record {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
