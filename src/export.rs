use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use image::RgbImage;
use rayon::{ThreadPool, prelude::*};
use tracing::{debug, warn};

use crate::{
    augment::Sample,
    dataset::{Label, Mode},
    error::Result,
};

/// `0000000000000042.png`
pub fn file_name(index: usize) -> String {
    format!("{index:016}.png")
}

/// 1-based position of sample `position` of batch `epoch` in the export.
pub fn sequence_index(epoch: usize, batch_size: usize, position: usize) -> usize {
    epoch * batch_size + position + 1
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub saved: usize,
    pub failed: usize,
}

/// Writes augmented batches as PNG files on a worker pool.
///
/// Segment mode writes images to `image_root` and masks under the same name to
/// `label_root`. Classify mode writes images to `image_root/<class>/`.
pub struct Exporter<'a> {
    pool: &'a ThreadPool,
    mode: Mode,
    image_root: PathBuf,
    label_root: Option<PathBuf>,
}

impl<'a> Exporter<'a> {
    /// Creates the export roots if they are missing.
    pub fn new(
        pool: &'a ThreadPool,
        mode: Mode,
        image_root: &Path,
        label_root: Option<&Path>,
    ) -> Result<Self> {
        fs::create_dir_all(image_root)?;
        if let Some(label_root) = label_root {
            fs::create_dir_all(label_root)?;
        }

        Ok(Self {
            pool,
            mode,
            image_root: image_root.to_path_buf(),
            label_root: label_root.map(Path::to_path_buf),
        })
    }

    /// Saves every sample of batch `epoch`. Failed writes are logged and
    /// counted, never fatal. A segment pair is written mask first, and the mask
    /// is removed again if its image can not be written.
    pub fn save_batch(&self, epoch: usize, samples: &[Sample]) -> SaveReport {
        if self.mode == Mode::Classify {
            self.create_class_dirs(samples);
        }

        let batch_size = samples.len();
        let results: Vec<bool> = self.pool.install(|| {
            samples
                .par_iter()
                .enumerate()
                .map(|(position, sample)| {
                    let name = file_name(sequence_index(epoch, batch_size, position));
                    self.save_sample(&name, sample)
                })
                .collect()
        });

        let saved = results.iter().filter(|&&ok| ok).count();
        SaveReport {
            saved,
            failed: results.len() - saved,
        }
    }

    fn create_class_dirs(&self, samples: &[Sample]) {
        let classes: BTreeSet<&str> = samples
            .iter()
            .filter_map(|s| s.label.class_name())
            .collect();
        for class_name in classes {
            let dir = self.image_root.join(class_name);
            if let Err(e) = fs::create_dir_all(&dir) {
                warn!("Can not create {}: {e}", dir.display());
            }
        }
    }

    fn save_sample(&self, name: &str, sample: &Sample) -> bool {
        match (self.mode, &sample.label) {
            (Mode::Segment, Label::Mask(mask)) => {
                let Some(label_root) = &self.label_root else {
                    warn!("No label export directory, skipping {name}");
                    return false;
                };
                let mask_path = label_root.join(name);
                if !save_png(mask, &mask_path) {
                    return false;
                }
                if save_png(&sample.image, &self.image_root.join(name)) {
                    return true;
                }
                if let Err(e) = fs::remove_file(&mask_path) {
                    warn!("Can not remove orphan mask {}: {e}", mask_path.display());
                }
                false
            }
            (Mode::Classify, Label::Class(class_name)) => {
                save_png(&sample.image, &self.image_root.join(class_name).join(name))
            }
            (mode, _) => {
                warn!("Sample {} has no {mode} label, skipping", sample.index);
                false
            }
        }
    }
}

fn save_png(image: &RgbImage, path: &Path) -> bool {
    match image.save_with_format(path, image::ImageFormat::Png) {
        Ok(()) => {
            debug!("Saved {}", path.display());
            true
        }
        Err(e) => {
            warn!("Failed to save {}: {e}", path.display());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(file_name(1), "0000000000000001.png");
        assert_eq!(file_name(1234567), "0000000001234567.png");
    }

    #[test]
    fn sequence_continues_across_batches() {
        assert_eq!(sequence_index(0, 32, 0), 1);
        assert_eq!(sequence_index(0, 32, 31), 32);
        assert_eq!(sequence_index(1, 32, 0), 33);
        assert_eq!(sequence_index(2, 4, 3), 12);
    }
}
