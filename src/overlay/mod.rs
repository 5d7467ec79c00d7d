//! Overlay image preprocessing.
//!
//! Turns an arbitrary raster image into a fixed-size, rounded-corner,
//! transparently padded PNG canvas for compositing. Preprocessing failure
//! is a deliberate feature degradation: the render continues with the
//! original bytes instead of aborting.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};

/// Square canvas edge length in pixels.
pub const CANVAS_SIZE: u32 = 400;
/// Corner radius of the alpha mask in pixels.
pub const CORNER_RADIUS: u32 = 24;

/// Errors from overlay preprocessing. Callers that want the
/// degrade-and-continue policy use [`round_overlay`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("image decode failed: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image encode failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// Produce the rounded overlay canvas, falling back to the original bytes
/// when decoding or compositing fails.
pub fn round_overlay(bytes: &[u8]) -> Vec<u8> {
    match compose(bytes, CANVAS_SIZE, CORNER_RADIUS) {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!("Overlay preprocessing failed, using original image: {}", e);
            bytes.to_vec()
        }
    }
}

/// Decode, fit within `canvas_size` (never upscaling), round the corners,
/// and center on a fully transparent square canvas encoded as PNG.
pub fn compose(bytes: &[u8], canvas_size: u32, radius: u32) -> Result<Vec<u8>, ProcessingError> {
    let img = image::load_from_memory(bytes).map_err(ProcessingError::Decode)?;

    let scaled = if img.width() > canvas_size || img.height() > canvas_size {
        img.resize(canvas_size, canvas_size, FilterType::Lanczos3)
    } else {
        img
    };

    let mut rgba = scaled.to_rgba8();
    apply_corner_mask(&mut rgba, radius);

    let mut canvas = RgbaImage::from_pixel(canvas_size, canvas_size, image::Rgba([0, 0, 0, 0]));
    let x = i64::from((canvas_size - rgba.width()) / 2);
    let y = i64::from((canvas_size - rgba.height()) / 2);
    image::imageops::overlay(&mut canvas, &rgba, x, y);

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(ProcessingError::Encode)?;
    Ok(buf.into_inner())
}

/// Zero the alpha of pixels outside the rounded-rectangle corner circles.
fn apply_corner_mask(img: &mut RgbaImage, radius: u32) {
    let (w, h) = img.dimensions();
    let r = i64::from(radius.min(w / 2).min(h / 2));
    if r == 0 {
        return;
    }
    let (wi, hi) = (i64::from(w), i64::from(h));

    for y in 0..hi {
        let cy = if y < r {
            Some(r)
        } else if y >= hi - r {
            Some(hi - r - 1)
        } else {
            None
        };
        let Some(cy) = cy else { continue };

        for x in 0..wi {
            let cx = if x < r {
                Some(r)
            } else if x >= wi - r {
                Some(wi - r - 1)
            } else {
                None
            };
            let Some(cx) = cx else { continue };

            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy > r * r {
                img.get_pixel_mut(x as u32, y as u32).0[3] = 0;
            }
        }
    }
}
