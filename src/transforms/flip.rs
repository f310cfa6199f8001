use crate::transforms::pipeline::Transform;
use burn::prelude::Backend;
use rand::Rng;

impl<B: Backend, R: Rng + Clone> Transform<B, R> {
    /// Flips the image and its label mask vertically, applied stochastically
    /// with probability `p`.
    ///
    /// # Arguments
    ///
    /// * `p` – Probability (`0.0 ≤ p ≤ 1.0`) that the vertical flip is applied.
    ///
    /// # Notes
    ///
    /// - One draw decides for both tensors, so image and mask stay aligned.
    /// - If the transformation is skipped, both remain unchanged.
    pub fn random_vertical_flip(&mut self, p: f32) -> Self {
        if !self.should_apply(p) {
            return self.clone();
        }

        self.vertical_flip()
    }

    /// Mirrors the image along the horizontal axis (top ↔ bottom) by reversing
    /// the row order. The label mask, when present, is flipped the same way.
    pub fn vertical_flip(&mut self) -> Self {
        self.image = self.image.clone().flip([1]);

        if let Some(label) = self.label.as_mut() {
            *label = label.clone().flip([1]);
        }

        self.clone()
    }

    /// Mirrors the image along the vertical axis (left ↔ right) by reversing
    /// the column order. The label mask, when present, is flipped the same way.
    pub fn horizontal_flip(&mut self) -> Self {
        self.image = self.image.clone().flip([2]);

        if let Some(label) = self.label.as_mut() {
            *label = label.clone().flip([2]);
        }

        self.clone()
    }

    /// Flips the image and its label mask horizontally, applied stochastically
    /// with probability `p`.
    ///
    /// # Arguments
    ///
    /// * `p` – Probability (`0.0 ≤ p ≤ 1.0`) that the horizontal flip is applied.
    pub fn random_horizontal_flip(&mut self, p: f32) -> Self {
        if !self.should_apply(p) {
            return self.clone();
        }
        self.horizontal_flip()
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::{NdArray, ndarray::NdArrayDevice};
    use image::Rgb;
    use rand::{SeedableRng, rngs::StdRng};

    use crate::transforms::pipeline::{Transform, create_test_image};

    type B = NdArray<f32>;

    #[test]
    fn vertical_flip_test() {
        let device = &NdArrayDevice::default();

        let mut image = create_test_image(4, 3, [0, 0, 0]);
        image.put_pixel(1, 0, Rgb([255, 0, 0]));
        let mut mask = create_test_image(4, 3, [0, 0, 0]);
        mask.put_pixel(1, 0, Rgb([1, 1, 1]));

        let (image, mask) =
            Transform::<B>::from_images(&image, Some(&mask), device, StdRng::seed_from_u64(3))
                .vertical_flip()
                .finish()
                .unwrap();
        let mask = mask.unwrap();

        assert_eq!(image.get_pixel(1, 2), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([0, 0, 0]));
        assert_eq!(mask.get_pixel(1, 2), &Rgb([1, 1, 1]));
    }

    #[test]
    fn horizontal_flip_test() {
        let device = &NdArrayDevice::default();

        // 2×1 image where left = red, right = blue
        let mut image = create_test_image(2, 1, [0, 0, 0]);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 0, 255]));

        let (image, mask) =
            Transform::<B>::from_images(&image, None, device, StdRng::seed_from_u64(3))
                .horizontal_flip()
                .finish()
                .unwrap();

        assert!(mask.is_none());
        assert_eq!(image.as_raw(), &vec![0, 0, 255, 255, 0, 0]);
    }

    #[test]
    fn random_flip_with_zero_probability_is_identity() {
        let device = &NdArrayDevice::default();
        let mut image = create_test_image(3, 3, [0, 0, 0]);
        image.put_pixel(0, 0, Rgb([9, 9, 9]));

        let (flipped, _) =
            Transform::<B>::from_images(&image, None, device, StdRng::seed_from_u64(3))
                .random_horizontal_flip(0.0)
                .random_vertical_flip(0.0)
                .finish()
                .unwrap();

        assert_eq!(flipped, image);
    }

    #[test]
    fn random_flips_keep_image_and_mask_aligned() {
        let device = &NdArrayDevice::default();
        let mut image = create_test_image(5, 5, [0, 0, 0]);
        image.put_pixel(1, 3, Rgb([255, 255, 255]));
        let mask = image.clone();

        for seed in 0..16 {
            let (image, mask) = Transform::<B>::from_images(
                &image,
                Some(&mask),
                device,
                StdRng::seed_from_u64(seed),
            )
            .random_horizontal_flip(0.5)
            .random_vertical_flip(0.5)
            .finish()
            .unwrap();

            assert_eq!(Some(image), mask);
        }
    }
}
