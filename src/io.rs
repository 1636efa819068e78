use jwalk::WalkDir;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::OutputMode;
use crate::error::{Error, Result};
use crate::types::{ImageAnnotation, LabelVocabulary, OutputDirs, Partition, PartitionDirs};
use crate::utils::create_output_directory;

pub const MANIFEST_FILE_NAME: &str = "data.yaml";

/// Lazily walk `root` for `.json` files in sorted order.
///
/// `skip` prunes one directory from the walk; it is used to keep a dataset
/// written inside the source tree out of the next run.
pub fn find_annotation_files(
    root: &Path,
    skip: Option<&Path>,
) -> impl Iterator<Item = Result<PathBuf>> {
    let skip = skip.map(Path::to_path_buf);
    WalkDir::new(root)
        .sort(true)
        .skip_hidden(false)
        .process_read_dir(move |_depth, _path, _state, children| {
            if let Some(skip) = &skip {
                children.retain(|entry| match entry {
                    Ok(entry) => entry.path() != *skip,
                    Err(_) => true,
                });
            }
        })
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => {
                let is_json = entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "json");
                is_json.then(|| Ok(entry.path()))
            }
            Err(e) => Some(Err(Error::from(e))),
        })
}

/// Read and parse a LabelMe JSON file, streaming from the file handle.
pub fn load_annotation(path: &Path) -> Result<ImageAnnotation> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Locate the image paired with an annotation file.
///
/// With an extension the image is the sibling file sharing the annotation's
/// base name. Without one, the annotation's `imagePath` is resolved against
/// the annotation's directory.
pub fn image_for_annotation(
    json_path: &Path,
    annotation: &ImageAnnotation,
    extension: Option<&str>,
) -> Result<PathBuf> {
    if let Some(extension) = extension {
        return Ok(json_path.with_extension(extension));
    }
    match annotation.image_path.as_deref().filter(|p| !p.is_empty()) {
        Some(image_path) => Ok(json_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(image_path)),
        None => Err(Error::MissingImage(json_path.to_path_buf())),
    }
}

/// Copy an image into `images_dir`, keeping its file name.
pub fn copy_image(image_path: &Path, images_dir: &Path) -> Result<PathBuf> {
    let file_name = image_path
        .file_name()
        .ok_or_else(|| Error::MissingImage(image_path.to_path_buf()))?;
    let image_output_path = images_dir.join(file_name);
    fs::copy(image_path, &image_output_path).map_err(|e| Error::io(image_path, e))?;
    Ok(image_output_path)
}

/// Set up `<output>/{train,valid,test}/{images,labels}`
pub fn setup_output_directories(output: &Path, mode: OutputMode) -> Result<OutputDirs> {
    let partition_dirs = |partition: Partition| -> Result<PartitionDirs> {
        let root = output.join(partition.dir_name());
        Ok(PartitionDirs {
            images: create_output_directory(&root.join("images"), mode)?,
            labels: create_output_directory(&root.join("labels"), mode)?,
        })
    };

    Ok(OutputDirs {
        root: output.to_path_buf(),
        train: partition_dirs(Partition::Train)?,
        valid: partition_dirs(Partition::Valid)?,
        test: partition_dirs(Partition::Test)?,
    })
}

/// Contents of `data.yaml`, the file a YOLO trainer reads to find the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: Vec<String>,
}

impl DatasetManifest {
    pub fn new(output_dirs: &OutputDirs, vocabulary: &LabelVocabulary) -> Self {
        let images =
            |partition: Partition| output_dirs.get(partition).images.display().to_string();
        DatasetManifest {
            train: images(Partition::Train),
            val: images(Partition::Valid),
            test: images(Partition::Test),
            nc: vocabulary.len(),
            names: vocabulary.names().to_vec(),
        }
    }
}

/// Create the data.yaml file for YOLO training
pub fn create_dataset_yaml(
    output_dirs: &OutputDirs,
    vocabulary: &LabelVocabulary,
) -> Result<PathBuf> {
    let manifest = DatasetManifest::new(output_dirs, vocabulary);
    let dataset_yaml_path = output_dirs.root.join(MANIFEST_FILE_NAME);

    let file = File::create(&dataset_yaml_path).map_err(|e| Error::io(&dataset_yaml_path, e))?;
    let mut writer = BufWriter::new(file);
    serde_yaml::to_writer(&mut writer, &manifest)?;
    writer
        .flush()
        .map_err(|e| Error::io(&dataset_yaml_path, e))?;
    Ok(dataset_yaml_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(image_path: Option<&str>) -> ImageAnnotation {
        ImageAnnotation {
            version: None,
            flags: None,
            shapes: vec![],
            image_path: image_path.map(str::to_string),
            image_height: 10,
            image_width: 10,
        }
    }

    #[test]
    fn test_find_annotation_files_recurses_and_skips_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::create_dir_all(root.join("dataset/train/labels")).unwrap();
        fs::write(root.join("top.json"), "{}").unwrap();
        fs::write(root.join("a/b/deep.json"), "{}").unwrap();
        fs::write(root.join("a/image.jpg"), "").unwrap();
        fs::write(root.join("dataset/train/labels/old.json"), "{}").unwrap();

        let skip = root.join("dataset");
        let found: Vec<PathBuf> = find_annotation_files(root, Some(skip.as_path()))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(found, vec![root.join("a/b/deep.json"), root.join("top.json")]);

        // Restartable: a second walk yields the same files
        let again: Vec<PathBuf> = find_annotation_files(root, Some(skip.as_path()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(found, again);

        let all = find_annotation_files(root, None).count();
        assert_eq!(all, 3);
    }

    #[test]
    fn test_image_for_annotation() {
        let json_path = Path::new("data/set/img_01.json");

        assert_eq!(
            image_for_annotation(json_path, &annotation(None), Some("jpg")).unwrap(),
            Path::new("data/set/img_01.jpg")
        );
        assert_eq!(
            image_for_annotation(json_path, &annotation(Some("../raw/img_01.png")), None).unwrap(),
            Path::new("data/set/../raw/img_01.png")
        );
        assert!(matches!(
            image_for_annotation(json_path, &annotation(None), None),
            Err(Error::MissingImage(_))
        ));
    }

    #[test]
    fn test_load_annotation_reports_parse_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_annotation(&path), Err(Error::Json { .. })));
        assert!(matches!(
            load_annotation(&temp_dir.path().join("missing.json")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_create_dataset_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = temp_dir.path().join("dataset");
        let output_dirs = setup_output_directories(&output, OutputMode::Overwrite).unwrap();
        let vocabulary = LabelVocabulary::new(["cat", "dog"]).unwrap();

        let yaml_path = create_dataset_yaml(&output_dirs, &vocabulary).unwrap();

        assert_eq!(yaml_path, output.join("data.yaml"));
        let manifest: DatasetManifest =
            serde_yaml::from_str(&fs::read_to_string(&yaml_path).unwrap()).unwrap();
        assert_eq!(manifest.nc, 2);
        assert_eq!(manifest.names, vec!["cat", "dog"]);
        assert_eq!(
            manifest.train,
            output.join("train").join("images").display().to_string()
        );
        assert_eq!(
            manifest.val,
            output.join("valid").join("images").display().to_string()
        );
        assert_eq!(
            manifest.test,
            output.join("test").join("images").display().to_string()
        );
        for partition in Partition::ALL {
            assert!(output.join(partition.dir_name()).join("images").is_dir());
            assert!(output.join(partition.dir_name()).join("labels").is_dir());
        }
    }
}
