//! Image transforms used by the augmentation engine.
//!
//! ```text
//! transforms/
//! ├── pipeline.rs     → `Transform` value, tensor conversions
//! ├── flip.rs         → horizontal / vertical mirror (image + mask)
//! ├── affine.rs       → rotation, rescale and translation in one warp (image + mask)
//! ├── photometric.rs  → brightness, contrast ratio, noise (image only)
//! ├── clamp.rs        → saturate and re-quantize
//! └── resize.rs       → letterbox resize at load time
//! ```

pub mod affine;
pub mod clamp;
pub mod flip;
pub mod photometric;
pub mod pipeline;
pub mod resize;

pub use affine::AffineMatrix;
pub use pipeline::{MAX_PIXEL_VAL, Transform};
pub use resize::letterbox;
