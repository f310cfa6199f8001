//! Error types shared by the engine, the loaders and the CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop an augmentation run.
///
/// Per-file load failures are not represented here: the loader turns them into
/// `None` and drops them from the working set.
#[derive(Error, Debug)]
pub enum AugmentError {
    /// Missing, mistyped or out-of-range configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid mode '{0}', expected 'segment' or 'classify'")]
    InvalidMode(String),

    #[error("Mode can not be changed once data has been loaded")]
    ModeLocked,

    #[error("Image and label counts do not match: {images} images, {labels} labels")]
    MismatchedCount { images: usize, labels: usize },

    #[error(
        "Image and label shapes do not match at index {index}: image {image:?}, label {label:?}"
    )]
    MismatchedShape {
        index: usize,
        image: (u32, u32),
        label: Option<(u32, u32)>,
    },

    #[error("Dataset is empty, nothing to sample from")]
    EmptyDataset,

    #[error("Engine has no data, call data() before augment()")]
    EngineNotReady,

    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, AugmentError>;
