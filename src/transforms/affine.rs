use crate::{
    config::ValueRange,
    error::Result,
    transforms::pipeline::{Transform, rgb32f_as_tensor, tensor_as_rgb32f},
};
use burn::prelude::Backend;
use image::Rgb;
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use rand::Rng;

/// A 2×3 affine matrix mapping source pixel coordinates `(x, y)` to
/// destination coordinates:
///
/// ```text
/// x' = m[0][0] * x + m[0][1] * y + m[0][2]
/// y' = m[1][0] * x + m[1][1] * y + m[1][2]
/// ```
///
/// Pixel centres sit on integer coordinates and `y` grows downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineMatrix {
    pub m: [[f32; 3]; 2],
}

impl AffineMatrix {
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
    };

    /// Rotation by `degrees` (counter-clockwise on screen) combined with an
    /// isotropic `scale`, both around `center = (x, y)`.
    ///
    /// ```text
    /// a = scale * cos(θ), b = scale * sin(θ)
    /// | a   b   (1 - a) * cx - b * cy |
    /// | -b  a   b * cx + (1 - a) * cy |
    /// ```
    pub fn rotation(center: (f32, f32), degrees: f32, scale: f32) -> Self {
        let (cx, cy) = center;
        let theta = degrees.to_radians();
        let a = scale * theta.cos();
        let b = scale * theta.sin();

        Self {
            m: [
                [a, b, (1.0 - a) * cx - b * cy],
                [-b, a, b * cx + (1.0 - a) * cy],
            ],
        }
    }

    /// Adds a translation after the linear part.
    pub fn translated(mut self, tx: f32, ty: f32) -> Self {
        self.m[0][2] += tx;
        self.m[1][2] += ty;
        self
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let [[a, b, c], [d, e, f]] = self.m;
        (a * x + b * y + c, d * x + e * y + f)
    }

    /// The matrix as an `imageproc` projection, or `None` if it collapses the
    /// plane (zero scale).
    pub fn projection(&self) -> Option<Projection> {
        let [[a, b, c], [d, e, f]] = self.m;
        Projection::from_matrix([a, b, c, d, e, f, 0.0, 0.0, 1.0])
    }
}

impl<B: Backend, R: Rng + Clone> Transform<B, R> {
    /// Applies `matrix` to the image (bilinear) and the label mask (nearest
    /// neighbour) in a single resampling pass each.
    ///
    /// The output canvas keeps the input size; uncovered pixels become 0. An
    /// identity matrix returns the tensors untouched, a degenerate one blanks
    /// them.
    pub fn warp_affine(&mut self, matrix: &AffineMatrix) -> Result<Self> {
        if matrix.is_identity() {
            return Ok(self.clone());
        }

        let Some(projection) = matrix.projection() else {
            self.image = self.image.zeros_like();
            self.label = self.label.as_ref().map(|label| label.zeros_like());
            return Ok(self.clone());
        };

        let image = tensor_as_rgb32f(self.image.clone())?;
        let warped = warp(&image, &projection, Interpolation::Bilinear, Rgb([0.0; 3]));
        self.image = rgb32f_as_tensor(&warped, &self.device);

        if let Some(label) = self.label.as_mut() {
            let mask = tensor_as_rgb32f(label.clone())?;
            let warped = warp(&mask, &projection, Interpolation::Nearest, Rgb([0.0; 3]));
            *label = rgb32f_as_tensor(&warped, &self.device);
        }

        Ok(self.clone())
    }

    /// Draws a rotation, a rescale and a translation and applies them as one
    /// affine warp.
    ///
    /// # Arguments
    ///
    /// * `max_degree` – Rotation is drawn from `[-max_degree, max_degree]`.
    /// * `rotate_prob` – Probability that any rotation happens at all.
    /// * `rescale` – Zoom factor range; values above 1 enlarge the content.
    /// * `translate_x` – Horizontal shift range as a fraction of the width.
    /// * `translate_y` – Vertical shift range as a fraction of the height.
    ///
    /// Rotation and scale pivot on the canvas centre `(width / 2, height / 2)`
    /// in whole pixels. The translation is added to the matrix afterwards.
    pub fn random_affine(
        &mut self,
        max_degree: f32,
        rotate_prob: f32,
        rescale: ValueRange,
        translate_x: ValueRange,
        translate_y: ValueRange,
    ) -> Result<Self> {
        let [height, width] = self.spatial_dims();

        let degree = if self.should_apply(rotate_prob) && max_degree > 0.0 {
            self.rng.random_range(-max_degree..=max_degree)
        } else {
            0.0
        };
        let scale = rescale.sample(&mut self.rng);
        let tx = translate_x.sample(&mut self.rng) * width as f32;
        let ty = translate_y.sample(&mut self.rng) * height as f32;

        let center = ((width / 2) as f32, (height / 2) as f32);
        let matrix = AffineMatrix::rotation(center, degree, scale).translated(tx, ty);

        self.warp_affine(&matrix)
    }
}
