pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{ConfigError, DecodeError, EngineError, InferenceError, RecognitionError};
pub use types::{RecognitionMode, RecognitionResponse};
