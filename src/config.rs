use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// Convert LabelMe JSON annotations into YOLO labels split into train/valid/test sets.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory searched recursively for LabelMe JSON files
    #[arg(long = "source")]
    pub source: PathBuf,

    /// Dataset output directory
    #[arg(long = "output")]
    pub output: PathBuf,

    /// Image file extension (e.g. jpg). Falls back to the annotation's imagePath when omitted
    #[arg(long = "format")]
    pub format: Option<String>,

    /// Ordered label list; a label's position is its class index
    #[arg(long = "labels", num_args = 1.., value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Proportion of the dataset used for training
    #[arg(long = "train-ratio", default_value_t = 0.8, value_parser = validate_ratio)]
    pub train_ratio: f64,

    /// Proportion of the dataset used for validation
    #[arg(long = "validation-ratio", default_value_t = 0.1, value_parser = validate_ratio)]
    pub validation_ratio: f64,

    /// Seed for the dataset shuffle
    #[arg(long = "random-seed", default_value_t = 42)]
    pub random_seed: u64,

    /// What to do with partition directories left over from a previous run
    #[arg(long = "output-mode", value_enum, default_value = "overwrite")]
    pub output_mode: OutputMode,

    /// Reorder rectangle corners to top-left/bottom-right before computing box size
    #[arg(long = "sort-corners")]
    pub sort_corners: bool,

    /// Fixed number of decimals for coordinates (shortest exact form when omitted)
    #[arg(long = "precision")]
    pub precision: Option<usize>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum OutputMode {
    /// Recreate the partition directories at the start of the run
    Overwrite,
    /// Keep existing files; label lines are appended to them
    Append,
}

impl Args {
    /// Image extension without its leading dot.
    pub fn image_extension(&self) -> Option<&str> {
        self.format
            .as_deref()
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
    }
}

// Ratios are validated individually; their sum is left to the split arithmetic
fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("RATIO must be between 0.0 and 1.0".to_string()),
    }
}
