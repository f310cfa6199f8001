use burn::prelude::Backend;
use rayon::ThreadPoolBuilder;
use tracing::info;

use crate::{
    augment::Augmentation,
    config::RunConfig,
    dataset::{DatasetLoader, Mode},
    error::{AugmentError, Result},
    export::Exporter,
    stats::ExportStats,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub loaded: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Loads the dataset, then augments and exports `epochs` batches.
pub fn run<B: Backend>(config: &RunConfig, device: &B::Device) -> Result<RunSummary> {
    config.validate()?;
    let label_dirs = match config.mode {
        Mode::Segment => Some(config.label_dirs().ok_or_else(|| {
            AugmentError::Config("segment mode requires both label_path and label_export".into())
        })?),
        Mode::Classify => None,
    };

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers())
        .build()?;
    info!(
        "Mode {}, {} workers, resize {}",
        config.mode,
        pool.current_num_threads(),
        config.resize
    );

    let loader = DatasetLoader::new(&pool, config.resize)?;
    let (images, labels) = match label_dirs {
        Some((label_root, _)) => loader.load_segment(&config.image_path, label_root)?,
        None => loader.load_classify(&config.image_path)?,
    };

    let mut engine = Augmentation::<B>::new(config.augmentation.clone(), device)?;
    engine.set_mode(config.mode.as_str())?;
    engine.data(images, labels, config.batch_size)?;
    let loaded = engine.len();

    let exporter = Exporter::new(
        &pool,
        config.mode,
        &config.image_export,
        label_dirs.map(|(_, export)| export),
    )?;

    let mut stats = ExportStats::new(config.epochs * config.batch_size);
    for (epoch, batch) in engine.batches()?.take(config.epochs).enumerate() {
        let report = exporter.save_batch(epoch, &batch?);
        stats.update(report.saved, report.failed);
    }
    stats.flush();

    Ok(RunSummary {
        loaded,
        saved: stats.saved(),
        failed: stats.failed(),
    })
}
