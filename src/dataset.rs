use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Args;
use crate::conversion::process_annotations;
use crate::error::{Error, Result};
use crate::io::{
    create_dataset_yaml, find_annotation_files, load_annotation, setup_output_directories,
};
use crate::types::{ImageAnnotation, LabelVocabulary, Partition, ProcessingStats, SplitData};
use crate::utils::create_progress_bar;

/// Shuffle `items` with a seeded RNG and cut them into train, valid and test sets.
///
/// The train set gets `floor(train_ratio * n)` items and the valid set
/// `floor(valid_ratio * n)`, both clamped to what is left; the test set takes
/// the remainder. The ratio sum is not checked.
pub fn split_dataset<T>(
    mut items: Vec<T>,
    train_ratio: f64,
    valid_ratio: f64,
    seed: u64,
) -> SplitData<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let n = items.len();
    let train_end = ((train_ratio * n as f64) as usize).min(n);
    let valid_end = (train_end + (valid_ratio * n as f64) as usize).min(n);

    let test = items.split_off(valid_end);
    let valid = items.split_off(train_end);

    SplitData {
        train: items,
        valid,
        test,
    }
}

/// Every label used in the annotations, sorted so class indices are stable.
pub fn gather_vocabulary<'a, I>(annotations: I) -> Result<LabelVocabulary>
where
    I: IntoIterator<Item = &'a ImageAnnotation>,
{
    let labels: BTreeSet<&str> = annotations
        .into_iter()
        .flat_map(|annotation| annotation.shapes.iter())
        .map(|shape| shape.label.as_str())
        .collect();
    LabelVocabulary::new(labels)
}

/// Discover and parse every annotation under `source`, skipping `skip`.
pub fn load_annotations(
    source: &Path,
    skip: Option<&Path>,
) -> Result<Vec<(PathBuf, ImageAnnotation)>> {
    find_annotation_files(source, skip)
        .map(|path| {
            let path = path?;
            let annotation = load_annotation(&path)?;
            Ok((path, annotation))
        })
        .collect()
}

/// Main dataset processing pipeline
pub fn process_dataset(args: &Args) -> Result<ProcessingStats> {
    let source = fs::canonicalize(&args.source).map_err(|e| Error::io(&args.source, e))?;
    // Only an existing output directory can be inside the source tree
    let skip = fs::canonicalize(&args.output).ok();

    let annotations = load_annotations(&source, skip.as_deref())?;
    info!("Read and parsed {} annotation files.", annotations.len());

    let vocabulary = if args.labels.is_empty() {
        let vocabulary = gather_vocabulary(annotations.iter().map(|(_, annotation)| annotation))?;
        info!(
            "No label list given, using {} labels found in the annotations: {:?}",
            vocabulary.len(),
            vocabulary.names()
        );
        vocabulary
    } else {
        LabelVocabulary::new(args.labels.iter().cloned())?
    };

    let split_data = split_dataset(
        annotations,
        args.train_ratio,
        args.validation_ratio,
        args.random_seed,
    );
    info!(
        "Split into {} train, {} valid and {} test annotations.",
        split_data.train.len(),
        split_data.valid.len(),
        split_data.test.len()
    );

    let output_dirs = setup_output_directories(&args.output, args.output_mode)?;

    let mut stats = ProcessingStats::new();
    for partition in Partition::ALL {
        let annotations = split_data.get(partition);
        info!(
            "Processing {} partition ({} annotations)...",
            partition,
            annotations.len()
        );
        let pb = create_progress_bar(partition, annotations.len() as u64);
        let summaries = process_annotations(
            annotations,
            output_dirs.get(partition),
            &vocabulary,
            args,
            &pb,
        )?;
        pb.finish_with_message("done");
        for summary in summaries {
            stats.record(partition, summary);
        }
    }

    info!("Creating data.yaml file...");
    let manifest_path = create_dataset_yaml(&output_dirs, &vocabulary)?;
    info!("Wrote {}", manifest_path.display());

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Shape;
    use std::collections::HashSet;

    #[test]
    fn test_split_sizes_truncate() {
        let split = split_dataset((0..10).collect::<Vec<u32>>(), 0.75, 0.15, 42);

        assert_eq!(split.train.len(), 7);
        assert_eq!(split.valid.len(), 1);
        assert_eq!(split.test.len(), 2);
    }

    #[test]
    fn test_split_is_total_and_disjoint() {
        for n in [0usize, 1, 2, 7, 33, 100] {
            for (train, valid) in [(0.8, 0.1), (0.7, 0.2), (0.0, 0.0), (1.0, 0.0), (0.6, 0.6)] {
                let split = split_dataset((0..n).collect(), train, valid, 7);

                assert_eq!(split.len(), n);
                let all: HashSet<usize> = split
                    .train
                    .iter()
                    .chain(&split.valid)
                    .chain(&split.test)
                    .copied()
                    .collect();
                assert_eq!(all, (0..n).collect::<HashSet<_>>());
                assert_eq!(split.train.len(), (train * n as f64) as usize);
            }
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let items: Vec<String> = (0..50).map(|i| format!("img_{i}.json")).collect();

        let first = split_dataset(items.clone(), 0.7, 0.2, 1234);
        let second = split_dataset(items.clone(), 0.7, 0.2, 1234);
        assert_eq!(first, second);

        let other_seed = split_dataset(items, 0.7, 0.2, 4321);
        assert_ne!(first, other_seed);
    }

    #[test]
    fn test_zero_ratios_put_everything_in_test() {
        let items: Vec<u32> = (0..20).collect();
        let split = split_dataset(items.clone(), 0.0, 0.0, 42);

        assert!(split.train.is_empty());
        assert!(split.valid.is_empty());
        assert_eq!(split.test.len(), 20);
        assert_ne!(split.test, items, "test set should be the shuffled input");
    }

    #[test]
    fn test_ratio_sum_above_one_truncates_valid() {
        let split = split_dataset((0..10).collect::<Vec<u32>>(), 0.8, 0.5, 42);

        assert_eq!(split.train.len(), 8);
        assert_eq!(split.valid.len(), 2);
        assert!(split.test.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let split = split_dataset(Vec::<u32>::new(), 0.8, 0.1, 42);
        assert!(split.is_empty());
    }

    #[test]
    fn test_gather_vocabulary_is_sorted_and_unique() {
        let shape = |label: &str| Shape {
            label: label.to_string(),
            points: vec![(0.0, 0.0), (1.0, 1.0)],
            shape_type: "rectangle".to_string(),
            group_id: None,
            description: None,
        };
        let annotations = vec![
            ImageAnnotation {
                version: None,
                flags: None,
                shapes: vec![shape("dog"), shape("cat")],
                image_path: None,
                image_height: 10,
                image_width: 10,
            },
            ImageAnnotation {
                version: None,
                flags: None,
                shapes: vec![shape("bird"), shape("dog")],
                image_path: None,
                image_height: 10,
                image_width: 10,
            },
        ];

        let vocabulary = gather_vocabulary(&annotations).unwrap();

        assert_eq!(vocabulary.names(), ["bird", "cat", "dog"]);
    }
}
