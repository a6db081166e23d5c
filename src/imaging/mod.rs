//! Image preprocessing
//!
//! Everything that touches pixels before they reach the model.

pub mod encode;
pub mod resize;

pub use encode::{decode_image, to_data_url};
pub use resize::{bounded_size, resize_bounded, DEFAULT_MAX_DIMENSION};
