use image::{RgbImage, imageops, imageops::FilterType};

/// Letterboxes `image` onto a black `target_size × target_size` canvas.
///
/// The longer side is scaled to `target_size`, the shorter one by the same
/// factor (rounded to the nearest pixel, at least 1). The result is centred;
/// when the padding is odd the extra pixel goes to the bottom/right.
///
/// # Filter Types
/// - `Triangle`: Bilinear filter, used for images
/// - `Nearest`: Nearest neighbour, used for label masks so values never blend
///
/// # Example
/// ```ignore
/// let square = letterbox(&image, 640, FilterType::Triangle);
/// assert_eq!(square.dimensions(), (640, 640));
/// ```
pub fn letterbox(image: &RgbImage, target_size: u32, filter: FilterType) -> RgbImage {
    let mut canvas = RgbImage::new(target_size, target_size);

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || target_size == 0 {
        return canvas;
    }

    let [scaled_w, scaled_h] = scaled_dims(width, height, target_size);

    let resized = if (scaled_w, scaled_h) == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, scaled_w, scaled_h, filter)
    };

    let left = (target_size - scaled_w) / 2;
    let top = (target_size - scaled_h) / 2;

    imageops::replace(&mut canvas, &resized, left as i64, top as i64);

    canvas
}

/// `[width, height]` of the content area inside a letterboxed canvas.
pub fn scaled_dims(width: u32, height: u32, target_size: u32) -> [u32; 2] {
    let scale = target_size as f64 / width.max(height) as f64;
    let fit = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, target_size);
    [fit(width), fit(height)]
}
