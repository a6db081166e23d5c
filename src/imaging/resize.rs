//! Bounded image resizing
//!
//! Large camera captures are shrunk before inference so the model runtime
//! does not run the device out of memory.

use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;

/// Longest side, in pixels, allowed by default.
pub const DEFAULT_MAX_DIMENSION: u32 = 2048;

/// Why a resample could not produce an image.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResizeError {
    #[error("Target size {width}x{height} is empty")]
    EmptyTarget { width: u32, height: u32 },
    #[error("Cannot allocate {0} bytes for the resized image")]
    Allocation(usize),
}

/// Size an image of `width`x`height` must be scaled to, or `None` if it already fits.
///
/// Both axes share one scale factor and are rounded independently, so the
/// aspect ratio can drift by up to one pixel per axis.
pub fn bounded_size(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dimension {
        return None;
    }

    let ratio = f64::from(max_dimension) / f64::from(longest);
    let scaled = |side: u32| (f64::from(side) * ratio).round() as u32;
    Some((scaled(width), scaled(height)))
}

/// Shrink `image` so its longest side is at most `max_dimension`.
///
/// Images that already fit are returned untouched. If the resample fails the
/// original is returned: still usable, just heavier.
pub fn resize_bounded(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let Some((target_width, target_height)) = bounded_size(width, height, max_dimension) else {
        return image;
    };

    match resample(&image, target_width, target_height) {
        Ok(resized) => {
            tracing::debug!(
                "Resized image {}x{} -> {}x{}",
                width,
                height,
                target_width,
                target_height
            );
            resized
        }
        Err(e) => {
            tracing::warn!("Keeping original {}x{} image: {}", width, height, e);
            image
        }
    }
}

fn resample(image: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage, ResizeError> {
    if width == 0 || height == 0 {
        return Err(ResizeError::EmptyTarget { width, height });
    }

    let bytes_per_pixel = usize::from(image.color().bytes_per_pixel());
    let bytes = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
        .ok_or(ResizeError::Allocation(usize::MAX))?;

    // Probe the allocation so exhaustion surfaces as an error, not an abort
    let mut probe: Vec<u8> = Vec::new();
    probe
        .try_reserve_exact(bytes)
        .map_err(|_| ResizeError::Allocation(bytes))?;
    drop(probe);

    Ok(image.resize_exact(width, height, FilterType::Triangle))
}
