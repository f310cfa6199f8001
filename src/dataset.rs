use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use image::{RgbImage, imageops::FilterType};
use rayon::{ThreadPool, prelude::*};
use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    error::{AugmentError, Result},
    transforms::letterbox,
};

/// Whether labels are masks that move with the image or class names that don't.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Mode {
    #[default]
    Segment,
    Classify,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Segment => "segment",
            Mode::Classify => "classify",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = AugmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "segment" => Ok(Mode::Segment),
            "classify" => Ok(Mode::Classify),
            other => Err(AugmentError::InvalidMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for Mode {
    type Error = AugmentError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// The label paired with an image.
#[derive(Clone, Debug, PartialEq)]
pub enum Label {
    /// Per-pixel mask with the image's dimensions (segment mode).
    Mask(RgbImage),
    /// Category name (classify mode).
    Class(String),
}

impl Label {
    pub fn as_mask(&self) -> Option<&RgbImage> {
        match self {
            Label::Mask(mask) => Some(mask),
            Label::Class(_) => None,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Label::Class(name) => Some(name),
            Label::Mask(_) => None,
        }
    }
}

/// Index-aligned images and labels, validated for the engine's mode.
#[derive(Clone, Debug)]
pub struct Dataset {
    images: Vec<RgbImage>,
    labels: Vec<Label>,
}

impl Dataset {
    /// Checks counts, emptiness and, in segment mode, that every label is a
    /// mask with the same dimensions as its image.
    pub fn new(images: Vec<RgbImage>, labels: Vec<Label>, mode: Mode) -> Result<Self> {
        if images.len() != labels.len() {
            return Err(AugmentError::MismatchedCount {
                images: images.len(),
                labels: labels.len(),
            });
        }

        if images.is_empty() {
            return Err(AugmentError::EmptyDataset);
        }

        if mode == Mode::Segment {
            for (index, (image, label)) in images.iter().zip(labels.iter()).enumerate() {
                let mask_dims = label.as_mask().map(|mask| mask.dimensions());
                if mask_dims != Some(image.dimensions()) {
                    return Err(AugmentError::MismatchedShape {
                        index,
                        image: image.dimensions(),
                        label: mask_dims,
                    });
                }
            }
        }

        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(&RgbImage, &Label)> {
        Some((self.images.get(index)?, self.labels.get(index)?))
    }
}

/// Decodes `path` as RGB and letterboxes it, or `None` if the file is missing
/// or can not be decoded.
pub fn load_image(path: &Path, size: u32, filter: FilterType) -> Option<RgbImage> {
    if !path.is_file() {
        debug!("Skipping {}: file not found", path.display());
        return None;
    }

    match image::open(path) {
        Ok(image) => Some(letterbox(&image.to_rgb8(), size, filter)),
        Err(e) => {
            debug!("Skipping {}: {e}", path.display());
            None
        }
    }
}

/// Finds segment-mode pairs: files directly under `image_root` and one level
/// of subdirectories, each paired with the same relative path under
/// `label_root` with a `.png` extension.
pub fn scan_segment(image_root: &Path, label_root: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    if !image_root.is_dir() {
        return Err(AugmentError::PathNotFound(image_root.to_path_buf()));
    }

    let mut pairs = Vec::new();
    for entry in WalkDir::new(image_root)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let image_path = entry.path().to_path_buf();
        let Ok(relative) = image_path.strip_prefix(image_root) else {
            continue;
        };
        let label_path = label_root.join(relative).with_extension("png");
        pairs.push((image_path, label_path));
    }

    Ok(pairs)
}

/// Finds classify-mode samples: one subdirectory per class under `image_root`,
/// the subdirectory name being the class label.
pub fn scan_classify(image_root: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !image_root.is_dir() {
        return Err(AugmentError::PathNotFound(image_root.to_path_buf()));
    }

    let mut class_dirs: Vec<(String, PathBuf)> = std::fs::read_dir(image_root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .collect();
    class_dirs.sort();

    let mut samples = Vec::new();
    for (class_name, class_dir) in class_dirs {
        let before = samples.len();
        for entry in WalkDir::new(&class_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            samples.push((entry.path().to_path_buf(), class_name.clone()));
        }
        debug!("Class '{}': {} files", class_name, samples.len() - before);
    }

    Ok(samples)
}

/// Loads a dataset from disk on a bounded worker pool.
///
/// Every file is decoded and letterboxed to `image_size × image_size`. Files
/// that are missing or fail to decode are dropped; for segment mode the whole
/// pair is dropped if either side failed.
pub struct DatasetLoader<'a> {
    pool: &'a ThreadPool,
    image_size: u32,
}

impl<'a> DatasetLoader<'a> {
    pub fn new(pool: &'a ThreadPool, image_size: u32) -> Result<Self> {
        if image_size == 0 {
            return Err(AugmentError::Config("resize must be positive".into()));
        }
        Ok(Self { pool, image_size })
    }

    pub fn load_segment(
        &self,
        image_root: &Path,
        label_root: &Path,
    ) -> Result<(Vec<RgbImage>, Vec<Label>)> {
        let pairs = scan_segment(image_root, label_root)?;
        info!("Found {} image/label pairs", pairs.len());

        let size = self.image_size;
        let loaded: Vec<(Option<RgbImage>, Option<RgbImage>)> = self.pool.install(|| {
            pairs
                .par_iter()
                .map(|(image_path, label_path)| {
                    rayon::join(
                        || load_image(image_path, size, FilterType::Triangle),
                        || load_image(label_path, size, FilterType::Nearest),
                    )
                })
                .collect()
        });

        let (images, labels): (Vec<_>, Vec<_>) = loaded
            .into_iter()
            .filter_map(|pair| match pair {
                (Some(image), Some(label)) => Some((image, Label::Mask(label))),
                _ => None,
            })
            .unzip();

        report_dropped(pairs.len(), images.len());
        Ok((images, labels))
    }

    pub fn load_classify(&self, image_root: &Path) -> Result<(Vec<RgbImage>, Vec<Label>)> {
        let samples = scan_classify(image_root)?;
        info!("Found {} images", samples.len());

        let found = samples.len();
        let size = self.image_size;
        let loaded: Vec<Option<RgbImage>> = self.pool.install(|| {
            samples
                .par_iter()
                .map(|(path, _)| load_image(path, size, FilterType::Triangle))
                .collect()
        });

        let (images, labels): (Vec<_>, Vec<_>) = loaded
            .into_iter()
            .zip(samples)
            .filter_map(|(image, (_, class_name))| Some((image?, Label::Class(class_name))))
            .unzip();

        report_dropped(found, images.len());
        Ok((images, labels))
    }
}

fn report_dropped(found: usize, kept: usize) {
    if found > kept {
        info!("Dropped {} unreadable samples", found - kept);
    }
    info!("Loaded {} samples", kept);
}
