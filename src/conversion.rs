use indicatif::ProgressBar;
use log::debug;
use rayon::prelude::*;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Args;
use crate::error::{Error, Result};
use crate::io::{copy_image, image_for_annotation};
use crate::types::{
    DetectionLine, ImageAnnotation, LabelVocabulary, PartitionDirs, RecordSummary, Shape, POLYGON,
    RECTANGLE,
};

/// Knobs that change the geometry of the produced lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Reorder rectangle corners so width and height are never negative.
    pub sort_corners: bool,
}

impl From<&Args> for NormalizeOptions {
    fn from(args: &Args) -> Self {
        NormalizeOptions {
            sort_corners: args.sort_corners,
        }
    }
}

/// Convert every supported shape of an annotation into a YOLO line.
///
/// Rectangle width and height are the signed difference `points[1] - points[0]`,
/// so corners given bottom-right first produce negative sizes. Use
/// [`normalize_with`] and `sort_corners` to avoid that.
pub fn normalize(
    annotation: &ImageAnnotation,
    vocabulary: &LabelVocabulary,
) -> Result<Vec<DetectionLine>> {
    normalize_with(annotation, vocabulary, NormalizeOptions::default())
}

/// Same as [`normalize`] with explicit options.
///
/// Shapes other than `polygon` and `rectangle` are skipped. Any label missing
/// from `vocabulary` fails the whole annotation, skipped shapes included.
pub fn normalize_with(
    annotation: &ImageAnnotation,
    vocabulary: &LabelVocabulary,
    options: NormalizeOptions,
) -> Result<Vec<DetectionLine>> {
    if annotation.image_width == 0 || annotation.image_height == 0 {
        return Err(Error::InvalidDimensions {
            width: annotation.image_width,
            height: annotation.image_height,
        });
    }
    let width = annotation.image_width as f64;
    let height = annotation.image_height as f64;

    let mut lines = Vec::with_capacity(annotation.shapes.len());
    for shape in &annotation.shapes {
        let class_index = vocabulary.class_index(&shape.label)?;
        let coords = match shape.shape_type.as_str() {
            POLYGON => polygon_coords(shape, width, height),
            RECTANGLE => rectangle_coords(shape, width, height, options.sort_corners)?,
            other => {
                debug!("Skipping {} shape labeled {:?}", other, shape.label);
                continue;
            }
        };
        lines.push(DetectionLine {
            class_index,
            coords,
        });
    }
    Ok(lines)
}

// x/width, y/height for every vertex, in order
fn polygon_coords(shape: &Shape, width: f64, height: f64) -> Vec<f64> {
    shape
        .points
        .iter()
        .flat_map(|&(x, y)| [x / width, y / height])
        .collect()
}

// center_x, center_y, box_width, box_height from two opposite corners
fn rectangle_coords(
    shape: &Shape,
    width: f64,
    height: f64,
    sort_corners: bool,
) -> Result<Vec<f64>> {
    let (mut x1, mut y1, mut x2, mut y2) = match shape.points.as_slice() {
        [(x1, y1), (x2, y2), ..] => (*x1, *y1, *x2, *y2),
        _ => return Err(malformed(shape)),
    };
    if sort_corners {
        (x1, x2) = (x1.min(x2), x1.max(x2));
        (y1, y2) = (y1.min(y2), y1.max(y2));
    }

    Ok(vec![
        (x1 + x2) / (2.0 * width),
        (y1 + y2) / (2.0 * height),
        (x2 - x1) / width,
        (y2 - y1) / height,
    ])
}

fn malformed(shape: &Shape) -> Error {
    Error::MalformedShape {
        label: shape.label.clone(),
        shape_type: shape.shape_type.clone(),
        points: shape.points.len(),
    }
}

/// Render lines as label file content, one line per detection.
pub fn render_lines(lines: &[DetectionLine], precision: Option<usize>) -> String {
    let mut yolo_data = String::with_capacity(lines.len() * 64);
    for line in lines {
        let rendered = match precision {
            Some(precision) => format!("{:.*}\n", precision, line),
            None => format!("{}\n", line),
        };
        yolo_data.push_str(&rendered);
    }
    yolo_data
}

/// Label file path for an image: `<labels_dir>/<image stem>.txt`.
pub fn label_path_for(image_path: &Path, labels_dir: &Path) -> PathBuf {
    let mut file_name = image_path.file_stem().unwrap_or_default().to_os_string();
    file_name.push(".txt");
    labels_dir.join(file_name)
}

/// Append rendered lines to `label_path`, creating the file if needed.
///
/// An empty `lines` still creates the file, marking a background image.
pub fn write_label_file(
    label_path: &Path,
    lines: &[DetectionLine],
    precision: Option<usize>,
) -> Result<()> {
    let yolo_data = render_lines(lines, precision);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(label_path)
        .map_err(|e| Error::io(label_path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(yolo_data.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| Error::io(label_path, e))
}

/// An annotation resolved to its image and normalized, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedAnnotation {
    pub image_path: PathBuf,
    pub lines: Vec<DetectionLine>,
    pub summary: RecordSummary,
}

/// Resolve the image of one annotation and normalize its shapes.
///
/// Touches nothing on disk, so annotations can be prepared in any order.
pub fn prepare_annotation(
    json_path: &Path,
    annotation: &ImageAnnotation,
    vocabulary: &LabelVocabulary,
    args: &Args,
) -> Result<PreparedAnnotation> {
    let image_path = image_for_annotation(json_path, annotation, args.image_extension())?;
    let lines = normalize_with(annotation, vocabulary, NormalizeOptions::from(args))?;
    let summary = RecordSummary {
        lines: lines.len(),
        skipped_shapes: annotation.shapes.len() - lines.len(),
    };
    Ok(PreparedAnnotation {
        image_path,
        lines,
        summary,
    })
}

/// Copy the image of a prepared annotation, then append its label file.
///
/// The label file is named after the image so YOLO can pair the two.
pub fn write_prepared(
    prepared: &PreparedAnnotation,
    dirs: &PartitionDirs,
    precision: Option<usize>,
) -> Result<()> {
    copy_image(&prepared.image_path, &dirs.images)?;
    let label_path = label_path_for(&prepared.image_path, &dirs.labels);
    write_label_file(&label_path, &prepared.lines, precision)
}

/// Convert the annotations of one partition, stopping at the first failure.
///
/// Normalization runs in parallel; images and label files are then written
/// in partition order, so annotations sharing an image name append to their
/// label file in the same order on every run.
pub fn process_annotations(
    annotations: &[(PathBuf, ImageAnnotation)],
    dirs: &PartitionDirs,
    vocabulary: &LabelVocabulary,
    args: &Args,
    pb: &ProgressBar,
) -> Result<Vec<RecordSummary>> {
    let prepared: Vec<PreparedAnnotation> = annotations
        .par_iter()
        .map(|(json_path, annotation)| {
            prepare_annotation(json_path, annotation, vocabulary, args)
                .map_err(|e| e.in_record(json_path))
        })
        .collect::<Result<_>>()?;

    let mut summaries = Vec::with_capacity(prepared.len());
    for ((json_path, _), prepared) in annotations.iter().zip(prepared) {
        write_prepared(&prepared, dirs, args.precision).map_err(|e| e.in_record(json_path))?;
        debug!(
            "Converted {} ({} lines)",
            json_path.display(),
            prepared.summary.lines
        );
        summaries.push(prepared.summary);
        pb.inc(1);
    }
    Ok(summaries)
}
