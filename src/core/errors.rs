// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining

use thiserror::Error;

/// Image ingestion errors (malformed or unsupported uploads)
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported image format: {0} (only PNG and JPEG are accepted)")]
    UnsupportedFormat(String),

    #[error("could not determine image format from upload bytes")]
    UnknownFormat,

    #[error("image decoding failed: {0}")]
    Malformed(#[from] image::ImageError),

    #[error("decoded image has invalid dimensions: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
}

/// Classical OCR backend errors (Tesseract invocation)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Tesseract invocation failed: {0}")]
    Invocation(String),

    #[error("could not convert bitmap for the OCR engine: {0}")]
    BitmapConversion(String),
}

/// Neural backend errors (preprocessing, session execution, generation)
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("ONNX inference failed: {0}")]
    Session(#[from] ort::Error),

    #[error("model artifact not found at: {path}")]
    ModelNotFound { path: String },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("image preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("generation failed: {0}")]
    Generation(String),
}

impl From<ort::Error<ort::session::builder::SessionBuilder>> for InferenceError {
    fn from(err: ort::Error<ort::session::builder::SessionBuilder>) -> Self {
        InferenceError::Session(ort::Error::from(err))
    }
}

/// Umbrella error matched at the dispatch boundary.
///
/// Backend failures are rendered as a visible message, never propagated
/// past the request handler.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Inference(#[from] InferenceError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Tesseract language must not be empty (set TESSERACT_LANG)")]
    EmptyLanguage,

    #[error("max_new_tokens must be > 0, got {0}")]
    InvalidMaxNewTokens(usize),

    #[error("max_upload_bytes must be > 0, got {0}")]
    InvalidUploadLimit(usize),

    #[error("intra-thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),
}

// Convenience type aliases for Results
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type EngineResult<T> = Result<T, EngineError>;
pub type InferenceResult<T> = Result<T, InferenceError>;
pub type DispatchResult<T> = Result<T, RecognitionError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

impl RecognitionError {
    /// Fixed banner prefix shown to the user, matching the backend that failed.
    pub fn banner_prefix(&self) -> &'static str {
        match self {
            RecognitionError::Decode(_) => "An error occurred while reading the image",
            RecognitionError::Engine(_) => "An error occurred during Tesseract OCR",
            RecognitionError::Inference(_) => "An error occurred during TrOCR recognition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_prefix_matches_error_kind() {
        let err = RecognitionError::Engine(EngineError::Invocation("boom".into()));
        assert_eq!(err.banner_prefix(), "An error occurred during Tesseract OCR");

        let err = RecognitionError::Inference(InferenceError::Generation("boom".into()));
        assert_eq!(err.banner_prefix(), "An error occurred during TrOCR recognition");

        let err = RecognitionError::Decode(DecodeError::UnknownFormat);
        assert_eq!(err.banner_prefix(), "An error occurred while reading the image");
    }

    #[test]
    fn test_underlying_message_is_preserved() {
        let err: RecognitionError = EngineError::Invocation("binary missing".into()).into();
        assert!(err.to_string().contains("binary missing"));
    }
}
