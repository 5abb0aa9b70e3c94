//! Image services used to illustrate plans.

pub mod image;
pub mod search;

pub use image::{ImageGenerator, error_placeholder, placeholder_url};
pub use search::ImageSearch;
