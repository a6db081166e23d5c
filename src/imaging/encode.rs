//! Image decoding and encoding at the crate boundaries
//!
//! Capture collaborators hand over encoded bytes; model runtimes take PNG data URLs.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, ImageResult};

/// Decode camera or gallery bytes (any format the `image` crate recognises).
pub fn decode_image(bytes: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(bytes)
}

/// Encode an image as PNG.
pub fn encode_png(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// `data:image/png;base64,...` form accepted by OpenAI-compatible vision endpoints.
pub fn to_data_url(image: &DynamicImage) -> ImageResult<String> {
    let png = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}
