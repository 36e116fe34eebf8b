pub mod tesseract;
pub mod trocr;

// Re-export commonly used services
pub use tesseract::TesseractService;
pub use trocr::{is_trocr_available, TrocrHandle, TrocrService};
