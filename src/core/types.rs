// Wire types for the recognition endpoint

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User-selected recognition pipeline.
///
/// Exactly one backend is invoked per triggered action; there is no
/// fallback between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMode {
    /// Traditional glyph recognition via the Tesseract engine
    #[serde(rename = "tesseract")]
    ClassicalOcr,
    /// Pretrained TrOCR encoder-decoder with greedy generation
    #[serde(rename = "trocr")]
    NeuralModel,
}

impl RecognitionMode {
    /// Label shown in the page's radio selector.
    pub fn label(&self) -> &'static str {
        match self {
            RecognitionMode::ClassicalOcr => "Tesseract OCR",
            RecognitionMode::NeuralModel => "Advanced Deep Learning (TrOCR)",
        }
    }
}

impl FromStr for RecognitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tesseract" => Ok(RecognitionMode::ClassicalOcr),
            "trocr" => Ok(RecognitionMode::NeuralModel),
            other => Err(format!(
                "unknown recognition method '{}' (expected 'tesseract' or 'trocr')",
                other
            )),
        }
    }
}

impl fmt::Display for RecognitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionMode::ClassicalOcr => write!(f, "tesseract"),
            RecognitionMode::NeuralModel => write!(f, "trocr"),
        }
    }
}

/// Successful recognition payload returned by POST /recognize
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResponse {
    pub method: RecognitionMode,
    pub text: String,
    pub elapsed_ms: f64,
}

/// Error payload returned by POST /recognize
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionErrorResponse {
    /// Fixed banner prefix ("An error occurred during ...")
    pub banner: String,
    /// Underlying failure text
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parses_form_values() {
        assert_eq!(
            "tesseract".parse::<RecognitionMode>().unwrap(),
            RecognitionMode::ClassicalOcr
        );
        assert_eq!(
            "trocr".parse::<RecognitionMode>().unwrap(),
            RecognitionMode::NeuralModel
        );
        assert_eq!(
            " TrOCR ".parse::<RecognitionMode>().unwrap(),
            RecognitionMode::NeuralModel
        );
        assert!("easyocr".parse::<RecognitionMode>().is_err());
    }

    #[test]
    fn test_mode_serializes_to_form_values() {
        assert_eq!(
            serde_json::to_string(&RecognitionMode::ClassicalOcr).unwrap(),
            "\"tesseract\""
        );
        assert_eq!(
            serde_json::to_string(&RecognitionMode::NeuralModel).unwrap(),
            "\"trocr\""
        );
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(RecognitionMode::ClassicalOcr.label(), "Tesseract OCR");
        assert_eq!(
            RecognitionMode::NeuralModel.label(),
            "Advanced Deep Learning (TrOCR)"
        );
    }
}
