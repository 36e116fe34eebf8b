pub mod image_ops;

// Re-export commonly used items
pub use image_ops::decode_upload;
