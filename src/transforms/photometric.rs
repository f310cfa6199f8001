use crate::{
    config::ValueRange,
    transforms::pipeline::{MAX_PIXEL_VAL, tensor_from_values},
};

use super::pipeline::Transform;
use burn::prelude::Backend;

use rand::Rng;

/// Mid-gray, the fixed point of [`Transform::contrast_ratio`].
pub const MID_GRAY: f32 = 128.0;

impl<B: Backend, R: Rng + Clone> Transform<B, R> {
    /// Scales every pixel by `factor`.
    ///
    /// The label mask is never touched by photometric transforms. Values are
    /// not clamped here; see [`Transform::clamp`].
    pub fn brightness_mul(&mut self, factor: f32) -> Self {
        self.image = self.image.clone().mul_scalar(factor);

        self.clone()
    }

    /// Adjusts the contrast of the image around mid-gray.
    ///
    /// `image += (image - 128) * ratio`
    ///
    /// - `0.0` leaves the image unchanged.
    /// - Positive values push pixels away from 128, negative values pull them
    ///   toward it (`-1.0` flattens everything to 128).
    pub fn contrast_ratio(&mut self, ratio: f32) -> Self {
        let spread = self.image.clone().sub_scalar(MID_GRAY).mul_scalar(ratio);
        self.image = self.image.clone() + spread;

        self.clone()
    }

    /// Adds a signed `offset` (in pixel levels) to every pixel.
    ///
    /// - Positive values brighten the image.
    /// - Negative values darken the image.
    pub fn brightness(&mut self, offset: f32) -> Self {
        self.image = self.image.clone().add_scalar(offset);

        self.clone()
    }

    /// Adds per-pixel uniform noise.
    ///
    /// `noise = U[0, 1) * 255 * opacity + offset`, drawn independently for each
    /// channel of each pixel from the pipeline's own generator.
    pub fn noise(&mut self, opacity: f32, offset: f32) -> Self {
        if opacity == 0.0 && offset == 0.0 {
            return self.clone();
        }

        let shape = self.image.dims();
        let count = shape.iter().product::<usize>();
        let amplitude = MAX_PIXEL_VAL * opacity;

        let noise: Vec<f32> = (0..count)
            .map(|_| self.rng.random::<f32>() * amplitude + offset)
            .collect();

        self.image = self.image.clone() + tensor_from_values(noise, shape, &self.device);

        self.clone()
    }

    /// Applies the random photometric chain to the image only:
    /// multiplicative brightness, contrast ratio, additive brightness, then noise.
    ///
    /// # Arguments
    ///
    /// * `mul` – Range for the brightness multiplier.
    /// * `ratio` – Range for the contrast ratio around mid-gray.
    /// * `offset` – Signed range, in pixel levels, for the additive brightness.
    /// * `opacity` – Range for the noise opacity. Its lower bound is also added
    ///   to every noise value as a constant floor.
    ///
    /// Each factor is drawn uniformly from its range on every call.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let t = t.random_photometric(
    ///     ValueRange::new(0.9, 1.1)?,    // brightness multiplier
    ///     ValueRange::fixed(0.0),        // contrast ratio
    ///     ValueRange::new(-20.0, 20.0)?, // brightness offset
    ///     ValueRange::new(0.0, 0.125)?,  // noise opacity
    /// );
    /// ```
    pub fn random_photometric(
        &mut self,
        mul: ValueRange,
        ratio: ValueRange,
        offset: ValueRange,
        opacity: ValueRange,
    ) -> Self {
        let mul = mul.sample(&mut self.rng);
        let ratio = ratio.sample(&mut self.rng);
        let offset = offset.sample(&mut self.rng);
        let noise_opacity = opacity.sample(&mut self.rng);

        self.brightness_mul(mul);
        self.contrast_ratio(ratio);
        self.brightness(offset);
        self.noise(noise_opacity, opacity.min())
    }
}

#[cfg(test)]
mod tests {
    use crate::transforms::pipeline::{create_test_image, tensor_values};
    use burn::backend::{NdArray, ndarray::NdArrayDevice};
    use image::{Rgb, RgbImage};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    type B = NdArray<f32>;

    fn pipeline(pattern: [u8; 3]) -> Transform<B> {
        let image = create_test_image(6, 4, pattern);
        seeded(&image)
    }

    /// `[x * 40, y * 60, 200]` on a 6x4 canvas.
    fn gradient() -> RgbImage {
        RgbImage::from_fn(6, 4, |x, y| Rgb([(x * 40) as u8, (y * 60) as u8, 200]))
    }

    fn seeded(image: &RgbImage) -> Transform<B> {
        Transform::<B>::from_images(
            image,
            None,
            &NdArrayDevice::default(),
            StdRng::seed_from_u64(3),
        )
    }

    fn values(t: Transform<B>) -> Vec<f32> {
        tensor_values(t.image).unwrap()
    }

    #[test]
    fn brightness_test() {
        let out = values(pipeline([10, 20, 30]).brightness(4.5));
        assert!(out.iter().take(24).all(|&v| (v - 14.5).abs() < 1e-5));
        assert!(out.iter().skip(48).all(|&v| (v - 34.5).abs() < 1e-5));
    }

    #[test]
    fn brightness_mul_test() {
        let out = values(pipeline([100, 100, 100]).brightness_mul(0.5));
        assert!(out.iter().all(|&v| (v - 50.0).abs() < 1e-5));
    }

    #[test]
    fn contrast_ratio_pivots_on_mid_gray() {
        let out = values(pipeline([128, 128, 128]).contrast_ratio(3.0));
        assert!(out.iter().all(|&v| (v - 128.0).abs() < 1e-5));

        // Ratio 1 doubles the distance from mid-gray.
        let out = values(pipeline([200, 100, 128]).contrast_ratio(1.0));
        assert!((out[0] - 272.0).abs() < 1e-5);
        assert!((out[24] - 72.0).abs() < 1e-5);
        assert!((out[48] - 128.0).abs() < 1e-5);

        let out = values(pipeline([138, 118, 128]).contrast_ratio(-0.5));
        assert!((out[0] - 133.0).abs() < 1e-5);
        assert!((out[24] - 123.0).abs() < 1e-5);

        let out = values(pipeline([37, 200, 4]).contrast_ratio(0.0));
        assert!((out[0] - 37.0).abs() < 1e-5);
    }

    #[test]
    fn contrast_ratio_is_per_pixel_on_a_gradient() {
        let image = gradient();
        let out = seeded(&image).contrast_ratio(0.5).finish().unwrap().0;

        for (x, y, p) in out.enumerate_pixels() {
            let src = image.get_pixel(x, y).0;
            for c in 0..3 {
                let v = src[c] as f32;
                let expected = (v + (v - 128.0) * 0.5).clamp(0.0, 255.0) as u8;
                assert_eq!(p.0[c], expected, "pixel ({x}, {y}) channel {c}");
            }
        }
    }

    #[test]
    fn full_opacity_noise_brightens_black() {
        let out = values(pipeline([0, 0, 0]).noise(1.0, 1.0));
        assert!(out.iter().all(|&v| v >= 1.0 && v <= 256.0));
    }

    #[test]
    fn neutral_photometric_chain_is_identity() {
        let image = gradient();
        let (out, _) = seeded(&image)
            .random_photometric(
                ValueRange::fixed(1.0),
                ValueRange::fixed(0.0),
                ValueRange::fixed(0.0),
                ValueRange::fixed(0.0),
            )
            .clamp()
            .finish()
            .unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn brightness_shifts_every_channel_of_a_gradient() {
        let image = gradient();
        let (out, _) = seeded(&image).brightness(10.0).clamp().finish().unwrap();

        for (x, y, p) in out.enumerate_pixels() {
            let src = image.get_pixel(x, y).0;
            let expected = src.map(|v| v.saturating_add(10));
            assert_eq!(p.0, expected, "pixel ({x}, {y})");
        }
    }

    #[test]
    fn photometric_leaves_the_mask_alone() {
        let image = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 50) as u8, (y * 50) as u8, 70]));
        let mut mask = create_test_image(4, 4, [0, 0, 0]);
        mask.put_pixel(1, 2, Rgb([3, 3, 3]));
        let (_, out_mask) = Transform::<B>::from_images(
            &image,
            Some(&mask),
            &NdArrayDevice::default(),
            StdRng::seed_from_u64(3),
        )
        .random_photometric(
            ValueRange::new(0.5, 1.5).unwrap(),
            ValueRange::new(0.5, 1.5).unwrap(),
            ValueRange::new(-30.0, 30.0).unwrap(),
            ValueRange::new(0.0, 0.5).unwrap(),
        )
        .clamp()
        .finish()
        .unwrap();

        assert_eq!(out_mask, Some(mask));
    }
}
