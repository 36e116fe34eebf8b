// Classical OCR backend - traditional glyph recognition via Tesseract
//
// The engine is invoked fresh on every call (rusty-tesseract shells out to
// the tesseract binary), so the service itself carries no per-call state
// beyond the configured invocation arguments.

use crate::core::config::TesseractConfig;
use crate::core::errors::{EngineError, EngineResult};
use crate::dispatch::TextRecognizer;
use image::DynamicImage;
use rusty_tesseract::{Args, Image};
use tracing::debug;

/// Stateless-per-call Tesseract backend
pub struct TesseractService {
    language: String,
}

impl TesseractService {
    pub fn new(config: &TesseractConfig) -> Self {
        Self {
            language: config.language.clone(),
        }
    }

    fn engine_args(&self) -> Args {
        Args {
            lang: self.language.clone(),
            ..Args::default()
        }
    }

    /// Run glyph recognition on a bitmap.
    ///
    /// Engine-internal line breaks are preserved; only trailing whitespace
    /// is trimmed. Any engine failure (binary missing, conversion error)
    /// surfaces as an EngineError for the dispatch boundary to render.
    pub fn recognize_text(&self, image: &DynamicImage) -> EngineResult<String> {
        let engine_image = Image::from_dynamic_image(image)
            .map_err(|e| EngineError::BitmapConversion(format!("{:?}", e)))?;

        let text = rusty_tesseract::image_to_string(&engine_image, &self.engine_args())
            .map_err(|e| EngineError::Invocation(format!("{:?}", e)))?;

        let text = text.trim_end().to_string();
        debug!("Tesseract extracted {} characters", text.len());
        Ok(text)
    }
}

impl TextRecognizer for TesseractService {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> crate::core::errors::DispatchResult<String> {
        self.recognize_text(image).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TesseractConfig;

    #[test]
    fn test_engine_args_carry_configured_language() {
        let service = TesseractService::new(&TesseractConfig {
            language: "deu".to_string(),
        });
        assert_eq!(service.engine_args().lang, "deu");
    }

    #[test]
    fn test_backend_name() {
        let service = TesseractService::new(&TesseractConfig {
            language: "eng".to_string(),
        });
        assert_eq!(service.name(), "tesseract");
    }
}
