use burn::tensor::{Tensor, TensorData, backend::Backend};
use image::{Rgb32FImage, RgbImage};

use rand::{Rng, rngs::StdRng};

use crate::error::{AugmentError, Result};

/// Maximum pixel value for a RGB8 pixel
pub const MAX_PIXEL_VAL: f32 = 255.0;

/// A pipeline for performing chained image augmentations.
///
/// `Transform` wraps a floating point image tensor together with an optional
/// label mask of the same spatial size, providing a unified interface for the
/// augmentation steps:
/// - Geometric transformations (horizontal/vertical flip, combined affine warp)
///   applied to the image and the mask alike
/// - Photometric adjustments (brightness, contrast ratio, noise) applied to the
///   image only
/// - Clamping back to the 8-bit value range
///
/// # Type Parameters
///
/// * `B` – The backend used for tensor operations, implementing the `Backend` trait.
/// * `R` – Random number generator used for stochastic augmentations (default: `StdRng`).
///
/// # Fields
///
/// * `image` – The 3-channel image tensor in `[C, H, W]` format, values in `0–255`.
/// * `label` – Optional label mask tensor, `[C, H, W]`, same `H` and `W` as `image`.
/// * `device` – Backend device where tensors reside.
/// * `rng` – Random number generator for stochastic transformations.
///
#[derive(Clone, Debug)]
pub struct Transform<B, R = StdRng>
where
    B: Backend,
    R: Rng,
{
    pub image: Tensor<B, 3>,
    pub label: Option<Tensor<B, 3>>,
    pub device: <B as Backend>::Device,
    pub rng: R,
}

impl<B: Backend, R: Rng + Clone> Transform<B, R> {
    /// Creates a new [`Transform`] with an explicitly provided random number generator.
    ///
    /// The device is taken from `image`. Supplying a seeded `rng` makes every
    /// random draw in the chain reproducible.
    ///
    /// # Examples
    /// ```ignore
    /// use rand::{SeedableRng, rngs::StdRng};
    ///
    /// let transform = Transform::new_seeded(image, Some(mask), StdRng::seed_from_u64(42));
    /// ```
    pub fn new_seeded(image: Tensor<B, 3>, label: Option<Tensor<B, 3>>, rng: R) -> Self {
        let device = image.device();
        Self {
            image,
            label,
            device,
            rng,
        }
    }

    /// Promotes an 8-bit image and optional mask to tensors on `device`.
    pub fn from_images(
        image: &RgbImage,
        label: Option<&RgbImage>,
        device: &B::Device,
        rng: R,
    ) -> Self {
        Self {
            image: rgb_img_as_tensor(image, device),
            label: label.map(|mask| rgb_img_as_tensor(mask, device)),
            device: device.clone(),
            rng,
        }
    }

    /// Returns `true` with probability `p`.
    ///
    /// - If `p` is 0.0, the function will always return `false`.
    /// - If `p` is 1.0, the function will always return `true`.
    /// - Values outside the range [0.0, 1.0] are clamped to this range.
    pub fn should_apply(&mut self, p: f32) -> bool {
        self.rng.random::<f32>() < p.clamp(0.0, 1.0)
    }

    /// `[height, width]` of the image tensor.
    pub fn spatial_dims(&self) -> [usize; 2] {
        let [_ch, height, width] = self.image.dims();
        [height, width]
    }

    /// Finalizes a chained pipeline and demotes the image (and mask) back to
    /// 8-bit RGB.
    ///
    /// Values are truncated toward zero and saturated to `0–255`, so callers
    /// normally run [`Transform::clamp`] first to make the result explicit.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let (image, mask) = Transform::from_images(&image, Some(&mask), &device, rng)
    ///     .random_horizontal_flip(0.5)
    ///     .random_affine(10.0, 0.5, scale, shift_x, shift_y)?
    ///     .clamp()
    ///     .finish()?;
    /// ```
    pub fn finish(self) -> Result<(RgbImage, Option<RgbImage>)> {
        let image = tensor_as_rgb_img(self.image)?;
        let label = self.label.map(tensor_as_rgb_img).transpose()?;
        Ok((image, label))
    }

}

/// Converts an `image::RgbImage` into a 3-channel tensor in `[C, H, W]` format.
///
/// The interleaved pixel buffer is split into channel planes up front, so
/// the tensor is built contiguous in `[C, H, W]` order. No normalization is
/// applied; values remain in `0–255`.
pub fn rgb_img_as_tensor<B: Backend>(image: &RgbImage, device: &B::Device) -> Tensor<B, 3> {
    let (width, height) = image.dimensions();
    tensor_from_values(
        to_planar(image.as_raw()),
        [3, height as usize, width as usize],
        device,
    )
}

/// Converts a `[C, H, W]` tensor back to an `RgbImage`.
///
/// Each value is truncated toward zero and saturated into `0–255`.
pub fn tensor_as_rgb_img<B: Backend>(tensor: Tensor<B, 3>) -> Result<RgbImage> {
    let [height, width] = rgb_dims(&tensor)?;
    let buf: Vec<u8> = to_interleaved(&tensor_values(tensor)?)
        .into_iter()
        .map(|p| p as u8)
        .collect();

    RgbImage::from_vec(width, height, buf).ok_or_else(|| {
        AugmentError::Tensor(format!("buffer does not fit a {width}x{height} image"))
    })
}

/// Same as [`rgb_img_as_tensor`] for a floating point image.
pub fn rgb32f_as_tensor<B: Backend>(image: &Rgb32FImage, device: &B::Device) -> Tensor<B, 3> {
    let (width, height) = image.dimensions();
    tensor_from_values(
        to_planar(image.as_raw()),
        [3, height as usize, width as usize],
        device,
    )
}

/// Converts a `[C, H, W]` tensor to a floating point image without any
/// rounding or saturation.
pub fn tensor_as_rgb32f<B: Backend>(tensor: Tensor<B, 3>) -> Result<Rgb32FImage> {
    let [height, width] = rgb_dims(&tensor)?;
    let buf = to_interleaved(&tensor_values(tensor)?);

    Rgb32FImage::from_vec(width, height, buf).ok_or_else(|| {
        AugmentError::Tensor(format!("buffer does not fit a {width}x{height} image"))
    })
}

fn rgb_dims<B: Backend>(tensor: &Tensor<B, 3>) -> Result<[u32; 2]> {
    let [ch, height, width] = tensor.dims();
    if ch != 3 {
        return Err(AugmentError::Tensor(format!(
            "expected 3 channels, found {ch}"
        )));
    }
    Ok([height as u32, width as u32])
}

/// `RGBRGB…` into `RR…GG…BB…`.
fn to_planar<T: Copy + Into<f32>>(raw: &[T]) -> Vec<f32> {
    let pixels = raw.len() / 3;
    let mut planar = vec![0.0; pixels * 3];
    for (i, px) in raw.chunks_exact(3).enumerate() {
        for (c, &v) in px.iter().enumerate() {
            planar[c * pixels + i] = v.into();
        }
    }
    planar
}

/// `RR…GG…BB…` into `RGBRGB…`.
fn to_interleaved(planar: &[f32]) -> Vec<f32> {
    let pixels = planar.len() / 3;
    (0..pixels)
        .flat_map(|i| (0..3).map(move |c| planar[c * pixels + i]))
        .collect()
}

/// Reads a tensor back as a flat row-major `Vec<f32>`.
///
/// Flipped or permuted tensors are views over another memory order; flattening
/// first copies them into row-major order before the data is taken out.
pub(crate) fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    let len = tensor.dims().iter().product::<usize>();
    tensor
        .reshape([len])
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| AugmentError::Tensor(format!("{e:?}")))
}

/// Builds a `[C, H, W]` tensor from a flat row-major buffer.
pub(crate) fn tensor_from_values<B: Backend>(
    values: Vec<f32>,
    shape: [usize; 3],
    device: &B::Device,
) -> Tensor<B, 3> {
    Tensor::<B, 3>::from_data(
        TensorData::new(values, shape).convert::<B::FloatElem>(),
        device,
    )
}

/// Creates an RGB test image with a specified pattern.
///
/// # Arguments
///
/// * `width` – The width of the image in pixels.
/// * `height` – The height of the image in pixels.
/// * `pattern` – A 3-element array representing the RGB value of every pixel.
pub fn create_test_image(width: u32, height: u32, pattern: [u8; 3]) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    let img_pattern: image::Rgb<u8> = image::Rgb(pattern);

    for px in img.pixels_mut() {
        *px = img_pattern;
    }

    img
}
