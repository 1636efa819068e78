use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const POLYGON: &str = "polygon";
pub const RECTANGLE: &str = "rectangle";

// The Shape struct representing one labeled region, points in pixels
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Shape {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub shape_type: String,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

// The ImageAnnotation struct representing one LabelMe annotation file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotation {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub flags: Option<HashMap<String, bool>>,
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub image_path: Option<String>,
    pub image_height: u32,
    pub image_width: u32,
}

/// Ordered list of class names. A label's position is its class index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelVocabulary {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelVocabulary {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocabulary = LabelVocabulary::default();
        for label in labels {
            let label = label.into();
            if vocabulary.index.contains_key(&label) {
                return Err(Error::DuplicateLabel(label));
            }
            vocabulary.index.insert(label.clone(), vocabulary.names.len());
            vocabulary.names.push(label);
        }
        Ok(vocabulary)
    }

    pub fn class_index(&self, label: &str) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| Error::UnknownLabel(label.to_string()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// One YOLO label line: class index followed by normalized coordinates.
///
/// `Display` renders `<class> <c1> <c2> ...`; a precision such as `{:.6}`
/// applies to every coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionLine {
    pub class_index: usize,
    pub coords: Vec<f64>,
}

impl fmt::Display for DetectionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_index)?;
        for coord in &self.coords {
            match f.precision() {
                Some(precision) => write!(f, " {:.*}", precision, coord)?,
                None => write!(f, " {}", coord)?,
            }
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    Train,
    Valid,
    Test,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Valid, Partition::Test];

    pub fn dir_name(self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Valid => "valid",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

// Struct to hold the split datasets for training, validation, and testing
#[derive(Debug, Clone, PartialEq)]
pub struct SplitData<T> {
    pub train: Vec<T>,
    pub valid: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitData<T> {
    pub fn get(&self, partition: Partition) -> &[T] {
        match partition {
            Partition::Train => &self.train,
            Partition::Valid => &self.valid,
            Partition::Test => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Images and labels directories of one partition
#[derive(Debug, Clone)]
pub struct PartitionDirs {
    pub images: PathBuf,
    pub labels: PathBuf,
}

// Struct to hold the paths to the output directories for train/valid/test splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub train: PartitionDirs,
    pub valid: PartitionDirs,
    pub test: PartitionDirs,
}

impl OutputDirs {
    pub fn get(&self, partition: Partition) -> &PartitionDirs {
        match partition {
            Partition::Train => &self.train,
            Partition::Valid => &self.valid,
            Partition::Test => &self.test,
        }
    }
}

/// Outcome of converting a single annotation file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordSummary {
    pub lines: usize,
    pub skipped_shapes: usize,
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub records: usize,
    pub train: usize,
    pub valid: usize,
    pub test: usize,
    pub lines_written: usize,
    pub skipped_shapes: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, partition: Partition, summary: RecordSummary) {
        self.records += 1;
        match partition {
            Partition::Train => self.train += 1,
            Partition::Valid => self.valid += 1,
            Partition::Test => self.test += 1,
        }
        self.lines_written += summary.lines;
        self.skipped_shapes += summary.skipped_shapes;
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Annotation files converted: {}", self.records);
        log::info!(
            "Partitions: train {}, valid {}, test {}",
            self.train,
            self.valid,
            self.test
        );
        log::info!("Label lines written: {}", self.lines_written);
        if self.skipped_shapes > 0 {
            log::warn!(
                "Skipped {} shapes with an unsupported shape_type",
                self.skipped_shapes
            );
        }
    }
}
