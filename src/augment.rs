use burn::prelude::Backend;
use image::RgbImage;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;

use crate::{
    config::AugmentConfig,
    dataset::{Dataset, Label, Mode},
    error::{AugmentError, Result},
    transforms::Transform,
};

/// One augmented example and the dataset index it was drawn from.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub index: usize,
    pub image: RgbImage,
    pub label: Label,
}

pub type Batch = Vec<Sample>;

/// Random augmentation engine over an in-memory dataset.
///
/// The mode is fixed once [`Augmentation::data`] has been called. The dataset
/// and configuration are never modified afterwards; only the random source
/// advances.
pub struct Augmentation<B: Backend, R: Rng = StdRng> {
    config: AugmentConfig,
    mode: Mode,
    dataset: Option<Dataset>,
    batch_size: usize,
    device: B::Device,
    rng: R,
}

impl<B: Backend> Augmentation<B> {
    pub fn new(config: AugmentConfig, device: &B::Device) -> Result<Self> {
        Self::with_rng(config, device, StdRng::from_os_rng())
    }
}

impl<B: Backend, R: Rng> Augmentation<B, R> {
    /// Builds an engine drawing from `rng`; a seeded generator makes every
    /// batch reproducible.
    pub fn with_rng(config: AugmentConfig, device: &B::Device, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mode: Mode::default(),
            dataset: None,
            batch_size: 0,
            device: device.clone(),
            rng,
        })
    }

    pub fn set_mode(&mut self, mode: &str) -> Result<()> {
        let mode: Mode = mode.parse()?;
        if self.dataset.is_some() {
            return Err(AugmentError::ModeLocked);
        }
        self.mode = mode;
        Ok(())
    }

    /// Installs the dataset, validated against the current mode.
    pub fn data(
        &mut self,
        images: Vec<RgbImage>,
        labels: Vec<Label>,
        batch_size: usize,
    ) -> Result<()> {
        if batch_size == 0 {
            return Err(AugmentError::Config("batch_size must be positive".into()));
        }
        let dataset = Dataset::new(images, labels, self.mode)?;
        debug!(
            "Engine ready: {} {} samples, batch size {}",
            dataset.len(),
            self.mode,
            batch_size
        );
        self.dataset = Some(dataset);
        self.batch_size = batch_size;
        Ok(())
    }

    /// Produces one batch of `batch_size` samples drawn with replacement.
    pub fn augment(&mut self) -> Result<Batch> {
        let source = BatchSource::<B>::new(
            &self.config,
            self.mode,
            self.dataset.as_ref(),
            self.batch_size,
            &self.device,
        )?;
        source.batch(&mut self.rng)
    }

    /// An endless stream of batches driven by the engine's own generator.
    ///
    /// Each call starts a new stream; take as many batches as needed.
    pub fn batches(&mut self) -> Result<Batches<'_, B, &mut R>> {
        let source = BatchSource::<B>::new(
            &self.config,
            self.mode,
            self.dataset.as_ref(),
            self.batch_size,
            &self.device,
        )?;
        Ok(Batches {
            source,
            rng: &mut self.rng,
        })
    }

    /// Like [`Augmentation::batches`] but with a caller-owned generator, so
    /// several independent streams can share one engine.
    pub fn batches_with<S: Rng>(&self, rng: S) -> Result<Batches<'_, B, S>> {
        let source = BatchSource::<B>::new(
            &self.config,
            self.mode,
            self.dataset.as_ref(),
            self.batch_size,
            &self.device,
        )?;
        Ok(Batches { source, rng })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.dataset.as_ref().map_or(0, Dataset::len)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.as_ref().is_none_or(Dataset::is_empty)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Infinite iterator of batches, see [`Augmentation::batches`].
pub struct Batches<'a, B: Backend, S: Rng> {
    source: BatchSource<'a, B>,
    rng: S,
}

impl<B: Backend, S: Rng> Iterator for Batches<'_, B, S> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.source.batch(&mut self.rng))
    }
}

struct BatchSource<'a, B: Backend> {
    config: &'a AugmentConfig,
    mode: Mode,
    dataset: &'a Dataset,
    batch_size: usize,
    device: &'a B::Device,
}

impl<'a, B: Backend> BatchSource<'a, B> {
    fn new(
        config: &'a AugmentConfig,
        mode: Mode,
        dataset: Option<&'a Dataset>,
        batch_size: usize,
        device: &'a B::Device,
    ) -> Result<Self> {
        let dataset = dataset.ok_or(AugmentError::EngineNotReady)?;
        Ok(Self {
            config,
            mode,
            dataset,
            batch_size,
            device,
        })
    }

    fn batch<S: Rng>(&self, rng: &mut S) -> Result<Batch> {
        (0..self.batch_size).map(|_| self.sample(rng)).collect()
    }

    fn sample<S: Rng>(&self, rng: &mut S) -> Result<Sample> {
        let index = rng.random_range(0..self.dataset.len());
        let (image, label) = self
            .dataset
            .get(index)
            .ok_or(AugmentError::EmptyDataset)?;

        let mask = match self.mode {
            Mode::Segment => label.as_mask(),
            Mode::Classify => None,
        };

        let c = self.config;
        let (image, mask) =
            Transform::<B>::from_images(image, mask, self.device, StdRng::from_rng(rng))
                .random_horizontal_flip(c.flip_horizontal)
                .random_vertical_flip(c.flip_vertical)
                .random_affine(
                    c.rotate_degree,
                    c.rotate_prob,
                    c.rescale_ratio_range,
                    c.translate_horizontal_range,
                    c.translate_vertical_range,
                )?
                .random_photometric(
                    c.brightness_range_mul,
                    c.brightness_range_ratio,
                    c.brightness_offset(),
                    c.noise_opacity_range,
                )
                .clamp()
                .finish()?;

        let label = match mask {
            Some(mask) => Label::Mask(mask),
            None => label.clone(),
        };

        Ok(Sample {
            index,
            image,
            label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ValueRange, transforms::pipeline::create_test_image};
    use burn::backend::{NdArray, ndarray::NdArrayDevice};
    use image::Rgb;

    type B = NdArray<f32>;
    type Engine = Augmentation<B, StdRng>;

    fn engine(config: AugmentConfig, mode: &str) -> Engine {
        let mut engine =
            Augmentation::with_rng(config, &NdArrayDevice::default(), StdRng::seed_from_u64(11))
                .unwrap();
        engine.set_mode(mode).unwrap();
        engine
    }

    fn black_pairs(count: usize, size: u32) -> (Vec<RgbImage>, Vec<Label>) {
        let images = vec![create_test_image(size, size, [0, 0, 0]); count];
        let labels = images.iter().cloned().map(Label::Mask).collect();
        (images, labels)
    }

    /// Distinct values per channel and per position, offset by `shift`.
    fn gradient(size: u32, shift: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            Rgb([
                ((x * 4 + shift) % 256) as u8,
                ((y * 4 + shift) % 256) as u8,
                ((x * 2 + y * 2 + 50) % 256) as u8,
            ])
        })
    }

    #[test]
    fn neutral_segment_batch_reproduces_inputs() {
        let images = vec![gradient(64, 0), gradient(64, 7)];
        let masks: Vec<_> = (0..2u8)
            .map(|i| RgbImage::from_fn(64, 64, |x, _| Rgb([(x as u8 / 8) + i; 3])))
            .collect();
        let labels = masks.iter().cloned().map(Label::Mask).collect();
        let mut engine = engine(AugmentConfig::identity(), "segment");
        engine.data(images.clone(), labels, 4).unwrap();

        let batch = engine.augment().unwrap();
        assert_eq!(batch.len(), 4);
        for sample in batch {
            assert!(sample.index < 2);
            assert_eq!(sample.image, images[sample.index]);
            assert_eq!(sample.label, Label::Mask(masks[sample.index].clone()));
        }
    }

    #[test]
    fn classify_labels_are_known_classes() {
        let classes = ["cat", "dog", "fox"];
        let images: Vec<_> = (0..6)
            .map(|i| create_test_image(16, 16, [i * 40, 0, 0]))
            .collect();
        let labels: Vec<_> = (0..6)
            .map(|i| Label::Class(classes[i % 3].to_string()))
            .collect();

        let mut engine = engine(AugmentConfig::default(), "classify");
        engine.data(images, labels.clone(), 10).unwrap();

        let batch = engine.augment().unwrap();
        assert_eq!(batch.len(), 10);
        for sample in batch {
            assert!(sample.index < 6);
            assert_eq!(sample.label, labels[sample.index]);
            assert_eq!(sample.image.dimensions(), (16, 16));
        }
    }

    #[test]
    fn full_noise_lifts_black_pixels() {
        let config = AugmentConfig {
            noise_opacity_range: ValueRange::fixed(1.0),
            ..AugmentConfig::identity()
        };
        let (images, labels) = black_pairs(1, 8);
        let mut engine = engine(config, "segment");
        engine.data(images, labels, 3).unwrap();

        for sample in engine.augment().unwrap() {
            assert!(sample.image.pixels().all(|p| p.0.iter().all(|&v| v > 0)));
            // Noise never reaches the mask.
            let mask = sample.label.as_mask().unwrap();
            assert!(mask.pixels().all(|p| p.0 == [0, 0, 0]));
        }
    }

    #[test]
    fn marker_moves_with_image_and_mask() {
        let mut image = create_test_image(10, 10, [0, 0, 0]);
        image.put_pixel(2, 7, Rgb([255, 255, 255]));
        let mut mask = create_test_image(10, 10, [0, 0, 0]);
        mask.put_pixel(2, 7, Rgb([1, 1, 1]));

        let config = AugmentConfig {
            flip_horizontal: 1.0,
            flip_vertical: 1.0,
            translate_vertical_range: ValueRange::fixed(0.2),
            ..AugmentConfig::identity()
        };
        let mut engine = engine(config, "segment");
        engine
            .data(vec![image], vec![Label::Mask(mask)], 2)
            .unwrap();

        for sample in engine.augment().unwrap() {
            let mask = sample.label.as_mask().unwrap();
            assert_eq!(sample.image.dimensions(), mask.dimensions());

            let marked = |img: &RgbImage| -> Vec<(u32, u32)> {
                img.enumerate_pixels()
                    .filter(|(_, _, p)| p.0 != [0, 0, 0])
                    .map(|(x, y, _)| (x, y))
                    .collect()
            };
            // Flipped to (7, 2), then shifted down by 2 rows.
            assert_eq!(marked(&sample.image), vec![(7, 4)]);
            assert_eq!(marked(mask), vec![(7, 4)]);
        }
    }

    #[test]
    fn classify_labels_pass_through_any_transform() {
        let config = AugmentConfig {
            flip_horizontal: 1.0,
            rotate_degree: 30.0,
            rotate_prob: 1.0,
            ..AugmentConfig::default()
        };
        let mut engine = engine(config, "classify");
        engine
            .data(
                vec![create_test_image(12, 12, [9, 9, 9])],
                vec![Label::Class("zebra".into())],
                5,
            )
            .unwrap();

        let batch = engine.augment().unwrap();
        assert!(batch.iter().all(|s| s.label.class_name() == Some("zebra")));
    }

    #[test]
    fn data_rejects_mismatched_input() {
        let (images, mut labels) = black_pairs(3, 8);
        labels.pop();
        let mut engine = engine(AugmentConfig::identity(), "segment");
        assert!(matches!(
            engine.data(images, labels, 2),
            Err(AugmentError::MismatchedCount {
                images: 3,
                labels: 2
            })
        ));

        let images = vec![create_test_image(8, 8, [0, 0, 0])];
        let labels = vec![Label::Mask(create_test_image(8, 9, [0, 0, 0]))];
        assert!(matches!(
            engine.data(images, labels, 2),
            Err(AugmentError::MismatchedShape { index: 0, .. })
        ));

        let (images, labels) = black_pairs(1, 8);
        assert!(matches!(
            engine.data(images, labels, 0),
            Err(AugmentError::Config(_))
        ));
    }

    #[test]
    fn augment_before_data_is_an_error() {
        let mut engine = engine(AugmentConfig::identity(), "segment");
        assert!(matches!(
            engine.augment(),
            Err(AugmentError::EngineNotReady)
        ));
        assert!(engine.batches().is_err());
        assert!(engine.is_empty());
    }

    #[test]
    fn mode_is_locked_after_data() {
        let mut engine = engine(AugmentConfig::identity(), "classify");
        assert!(matches!(
            engine.set_mode("detect"),
            Err(AugmentError::InvalidMode(_))
        ));
        engine
            .data(
                vec![create_test_image(4, 4, [0, 0, 0])],
                vec![Label::Class("a".into())],
                1,
            )
            .unwrap();
        assert!(matches!(
            engine.set_mode("segment"),
            Err(AugmentError::ModeLocked)
        ));
        assert_eq!(engine.mode(), Mode::Classify);
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.batch_size(), 1);
    }

    #[test]
    fn seeded_streams_are_reproducible() {
        let (images, labels) = black_pairs(3, 12);
        let mut engine = engine(AugmentConfig::default(), "segment");
        engine.data(images, labels, 2).unwrap();

        let first: Vec<Batch> = engine
            .batches_with(StdRng::seed_from_u64(5))
            .unwrap()
            .take(3)
            .collect::<Result<_>>()
            .unwrap();
        let second: Vec<Batch> = engine
            .batches_with(StdRng::seed_from_u64(5))
            .unwrap()
            .take(3)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(first, second);

        let streamed = engine.batches().unwrap().take(4).count();
        assert_eq!(streamed, 4);
    }
}
