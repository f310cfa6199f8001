use std::path::{Path, PathBuf};

use argh::FromArgs;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Mode,
    error::{AugmentError, Result},
};

pub const DEFAULT_RESIZE: u32 = 640;
pub const DEFAULT_EPOCHS: usize = 50;
pub const DEFAULT_BATCH_SIZE: usize = 32;

pub const USAGE: &str = "\
Offline image augmentation tool

Usage: rust-augment cfg.yaml

Format of cfg.yaml

    mode: segment or classify
    image_path: path/to/images
    label_path: path/to/labels          # segment mode only
    image_export: export/to/path/to/images
    label_export: export/to/path/to/labels  # segment mode only
    batch_size: images augmented per batch   (default 32)
    epochs: number of batches                (default 50)
    resize: resize to NxN                    (default 640)
    workers: loader/exporter threads         (default: all cores)

Optional augmentation keys (defaults in brackets)

    flip_vertical: probability               [0.5]
    flip_horizontal: probability             [0.5]
    rotate_degree: max rotation in degrees   [0]
    rotate_prob: probability of rotation     [0]
    brightness_range_add: [min, max]         [0.9, 1.1]  (1.0 = no shift, +-0.1 = +-25.5 levels)
    brightness_range_mul: [min, max]         [1, 1]
    brightness_range_ratio: [min, max]       [1, 1]      (img += (img - 128) * r, 0 = no change)
    noise_opacity_range: [min, max]          [0, 0.125]
    translate_vertical_range: [min, max]     [0, 0.125]  (fraction of height)
    translate_horizontal_range: [min, max]   [0, 0]      (fraction of width)
    rescale_ratio_range: [min, max]          [0.8, 1.2]
";

/// An inclusive `[min, max]` range, checked once when it is built.
///
/// In YAML it is written as a two element list, `[0.8, 1.2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 2]", into = "[f32; 2]")]
pub struct ValueRange {
    min: f32,
    max: f32,
}

impl ValueRange {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(AugmentError::Config(format!(
                "range bounds must be finite (got [{min}, {max}])"
            )));
        }
        if min > max {
            return Err(AugmentError::Config(format!(
                "range minimum is larger than maximum (got [{min}, {max}])"
            )));
        }
        Ok(Self { min, max })
    }

    /// A range that always yields `value`.
    pub const fn fixed(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    // Only for compile time defaults, which are known to be ordered.
    const fn ordered(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Uniform draw from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.min == self.max {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }

    /// Maps both bounds through `f(v) = v * scale + offset`, keeping the result ordered.
    pub fn affine(&self, scale: f32, offset: f32) -> Self {
        let a = self.min * scale + offset;
        let b = self.max * scale + offset;
        Self::ordered(a.min(b), a.max(b))
    }
}

impl TryFrom<[f32; 2]> for ValueRange {
    type Error = AugmentError;

    fn try_from(value: [f32; 2]) -> Result<Self> {
        Self::new(value[0], value[1])
    }
}

impl From<ValueRange> for [f32; 2] {
    fn from(value: ValueRange) -> Self {
        [value.min, value.max]
    }
}

/// Augmentation parameters, fixed for the lifetime of an engine.
///
/// Missing YAML keys fall back to [`AugmentConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub flip_vertical: f32,
    pub flip_horizontal: f32,
    pub rotate_degree: f32,
    pub rotate_prob: f32,
    /// Brightness factor centred on 1.0, see [`AugmentConfig::brightness_offset`].
    pub brightness_range_add: ValueRange,
    pub brightness_range_mul: ValueRange,
    pub brightness_range_ratio: ValueRange,
    pub noise_opacity_range: ValueRange,
    pub translate_vertical_range: ValueRange,
    pub translate_horizontal_range: ValueRange,
    pub rescale_ratio_range: ValueRange,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            flip_vertical: 0.5,
            flip_horizontal: 0.5,
            rotate_degree: 0.0,
            rotate_prob: 0.0,
            brightness_range_add: ValueRange::ordered(0.9, 1.1),
            brightness_range_mul: ValueRange::fixed(1.0),
            brightness_range_ratio: ValueRange::fixed(1.0),
            noise_opacity_range: ValueRange::ordered(0.0, 0.125),
            translate_vertical_range: ValueRange::ordered(0.0, 0.125),
            translate_horizontal_range: ValueRange::fixed(0.0),
            rescale_ratio_range: ValueRange::ordered(0.8, 1.2),
        }
    }
}

impl AugmentConfig {
    /// A configuration under which every transform leaves the image untouched.
    pub fn identity() -> Self {
        Self {
            flip_vertical: 0.0,
            flip_horizontal: 0.0,
            rotate_degree: 0.0,
            rotate_prob: 0.0,
            brightness_range_add: ValueRange::fixed(1.0),
            brightness_range_mul: ValueRange::fixed(1.0),
            brightness_range_ratio: ValueRange::fixed(0.0),
            noise_opacity_range: ValueRange::fixed(0.0),
            translate_vertical_range: ValueRange::fixed(0.0),
            translate_horizontal_range: ValueRange::fixed(0.0),
            rescale_ratio_range: ValueRange::fixed(1.0),
        }
    }

    /// Signed additive brightness range in pixel levels.
    ///
    /// `brightness_range_add` is a factor around 1.0 and each factor `f` maps to
    /// an offset of `(f - 1) * 255`, so the default `[0.9, 1.1]` becomes
    /// `[-25.5, 25.5]` and `[1, 1]` adds nothing.
    pub fn brightness_offset(&self) -> ValueRange {
        self.brightness_range_add.affine(255.0, -255.0)
    }

    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("flip_vertical", self.flip_vertical),
            ("flip_horizontal", self.flip_horizontal),
            ("rotate_prob", self.rotate_prob),
        ];
        for (name, p) in probabilities {
            if !(0.0..=1.0).contains(&p) {
                return Err(AugmentError::Config(format!(
                    "{name} must be a probability in [0.0, 1.0] (got {p})"
                )));
            }
        }

        if !self.rotate_degree.is_finite() || self.rotate_degree < 0.0 {
            return Err(AugmentError::Config(format!(
                "rotate_degree must be a non-negative number of degrees (got {})",
                self.rotate_degree
            )));
        }

        if self.rescale_ratio_range.min() <= 0.0 {
            return Err(AugmentError::Config(format!(
                "rescale_ratio_range must be strictly positive (got [{}, {}])",
                self.rescale_ratio_range.min(),
                self.rescale_ratio_range.max()
            )));
        }

        if self.noise_opacity_range.min() < 0.0 {
            return Err(AugmentError::Config(format!(
                "noise_opacity_range must not be negative (got [{}, {}])",
                self.noise_opacity_range.min(),
                self.noise_opacity_range.max()
            )));
        }

        Ok(())
    }
}

fn default_resize() -> u32 {
    DEFAULT_RESIZE
}

fn default_epochs() -> usize {
    DEFAULT_EPOCHS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

/// Everything read from the YAML file handed to the CLI.
#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    pub mode: Mode,
    pub image_path: PathBuf,
    pub image_export: PathBuf,
    #[serde(default)]
    pub label_path: Option<PathBuf>,
    #[serde(default)]
    pub label_export: Option<PathBuf>,
    #[serde(default = "default_resize")]
    pub resize: u32,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(flatten)]
    pub augmentation: AugmentConfig,
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AugmentError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
            .map_err(|e| AugmentError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| AugmentError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == Mode::Segment && (self.label_path.is_none() || self.label_export.is_none())
        {
            return Err(AugmentError::Config(
                "segment mode requires both label_path and label_export".into(),
            ));
        }
        if self.resize == 0 {
            return Err(AugmentError::Config("resize must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(AugmentError::Config("batch_size must be positive".into()));
        }
        if self.workers == Some(0) {
            return Err(AugmentError::Config("workers must be positive".into()));
        }
        self.augmentation.validate()
    }

    /// Label source and export directories, present in segment mode.
    pub fn label_dirs(&self) -> Option<(&Path, &Path)> {
        match (&self.label_path, &self.label_export) {
            (Some(src), Some(dst)) if self.mode == Mode::Segment => {
                Some((src.as_path(), dst.as_path()))
            }
            _ => None,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[derive(FromArgs, PartialEq, Debug)]
/// Generate randomly augmented copies of an image dataset.
pub struct AugmentCmd {
    #[argh(positional)]
    /// path to the YAML configuration file
    pub config: Option<String>,
}

impl AugmentCmd {
    /// Parses the arguments after the program name.
    ///
    /// `None` for `help`, `--help` and anything argh rejects, such as a second
    /// positional argument. The caller shows [`USAGE`] in every such case.
    pub fn parse(args: &[&str]) -> Option<Self> {
        <AugmentCmd as FromArgs>::from_args(&["rust-augment"], args).ok()
    }

    /// The config file to run with, or `None` when only the usage text should be shown.
    pub fn config_path(&self) -> Option<PathBuf> {
        let path = PathBuf::from(self.config.as_deref()?);
        path.is_file().then_some(path)
    }
}
