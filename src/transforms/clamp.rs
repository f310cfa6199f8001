use super::pipeline::{MAX_PIXEL_VAL, Transform};
use burn::prelude::Backend;
use rand::Rng;

impl<B: Backend, R: Rng + Clone> Transform<B, R> {
    /// Saturates the image to `0–255` and truncates it onto the 8-bit grid.
    ///
    /// Running it twice gives the same tensor as running it once. The label
    /// mask only ever holds resampled 8-bit values and is left as is.
    pub fn clamp(&mut self) -> Self {
        self.image = self.image.clone().clamp(0.0, MAX_PIXEL_VAL).floor();

        self.clone()
    }
}
