//! LabelMe to YOLO dataset builder
//!
//! Converts LabelMe JSON annotations (polygons and rectangles) into YOLO label
//! files and splits the image/label pairs into train, valid and test sets with
//! a `data.yaml` manifest.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod io;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Args, OutputMode};
pub use conversion::{normalize, normalize_with, NormalizeOptions};
pub use dataset::{process_dataset, split_dataset};
pub use error::{Error, Result};
pub use io::{create_dataset_yaml, setup_output_directories, DatasetManifest};
pub use types::{
    DetectionLine, ImageAnnotation, LabelVocabulary, OutputDirs, Partition, Shape, SplitData,
};
