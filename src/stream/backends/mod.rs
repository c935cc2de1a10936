//! Renderer implementations.

pub mod hls;
pub mod native;

pub use hls::VariantChoice;
pub use native::{HttpSegmentLoader, NativeRenderer, SegmentDecryptor};
