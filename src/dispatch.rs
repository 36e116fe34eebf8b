// Selection & dispatch: the single decision point between the two backends

use crate::core::errors::DispatchResult;
use crate::core::types::RecognitionMode;
use crate::utils::decode_upload;
use image::DynamicImage;
use tracing::debug;

/// A recognition backend: bitmap in, text out.
///
/// Both backends implement this seam so routing stays a pure function and
/// can be exercised with stub recognizers in tests.
pub trait TextRecognizer: Send + Sync {
    /// Backend identifier used in logs
    fn name(&self) -> &'static str;

    /// Extract text from a decoded bitmap
    fn recognize(&self, image: &DynamicImage) -> DispatchResult<String>;
}

/// Route the bitmap to exactly one backend based on the selected mode.
///
/// No fallback between backends, no retry: an error from the selected
/// backend is returned as-is for the caller to render.
pub fn dispatch(
    image: &DynamicImage,
    mode: RecognitionMode,
    classical: &dyn TextRecognizer,
    neural: &dyn TextRecognizer,
) -> DispatchResult<String> {
    let backend = match mode {
        RecognitionMode::ClassicalOcr => classical,
        RecognitionMode::NeuralModel => neural,
    };

    debug!("Dispatching {}x{} image to {}", image.width(), image.height(), backend.name());
    backend.recognize(image)
}

/// Decode raw upload bytes and route the bitmap in one step.
///
/// Ingestion runs first: a malformed or unsupported upload returns a
/// DecodeError before either backend is touched.
pub fn recognize_upload(
    bytes: &[u8],
    mode: RecognitionMode,
    classical: &dyn TextRecognizer,
    neural: &dyn TextRecognizer,
) -> DispatchResult<String> {
    let image = decode_upload(bytes)?;
    dispatch(&image, mode, classical, neural)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{EngineError, RecognitionError};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRecognizer {
        name: &'static str,
        text: &'static str,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubRecognizer {
        fn new(name: &'static str, text: &'static str) -> Self {
            Self {
                name,
                text,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                text: "",
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextRecognizer for StubRecognizer {
        fn name(&self) -> &'static str {
            self.name
        }

        fn recognize(&self, _image: &DynamicImage) -> DispatchResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(EngineError::Invocation("simulated engine failure".into()).into())
            } else {
                Ok(self.text.to_string())
            }
        }
    }

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn test_classical_mode_never_touches_neural_backend() {
        let classical = StubRecognizer::new("tesseract", "hello world");
        let neural = StubRecognizer::new("trocr", "neural text");

        let text = dispatch(
            &test_image(),
            RecognitionMode::ClassicalOcr,
            &classical,
            &neural,
        )
        .unwrap();

        assert_eq!(text, "hello world");
        assert_eq!(classical.call_count(), 1);
        assert_eq!(neural.call_count(), 0);
    }

    #[test]
    fn test_neural_mode_never_touches_classical_backend() {
        let classical = StubRecognizer::new("tesseract", "hello world");
        let neural = StubRecognizer::new("trocr", "neural text");

        let text = dispatch(
            &test_image(),
            RecognitionMode::NeuralModel,
            &classical,
            &neural,
        )
        .unwrap();

        assert_eq!(text, "neural text");
        assert_eq!(classical.call_count(), 0);
        assert_eq!(neural.call_count(), 1);
    }

    #[test]
    fn test_backend_error_is_returned_not_propagated_elsewhere() {
        let classical = StubRecognizer::failing("tesseract");
        let neural = StubRecognizer::new("trocr", "neural text");

        let err = dispatch(
            &test_image(),
            RecognitionMode::ClassicalOcr,
            &classical,
            &neural,
        )
        .unwrap_err();

        assert!(matches!(err, RecognitionError::Engine(_)));
        assert!(err.to_string().contains("simulated engine failure"));
        // No fallback to the other backend on failure
        assert_eq!(neural.call_count(), 0);
    }

    #[test]
    fn test_corrupted_upload_invokes_no_backend() {
        let classical = StubRecognizer::new("tesseract", "hello world");
        let neural = StubRecognizer::new("trocr", "neural text");

        for mode in [RecognitionMode::ClassicalOcr, RecognitionMode::NeuralModel] {
            let err = recognize_upload(
                b"definitely not a png despite the extension",
                mode,
                &classical,
                &neural,
            )
            .unwrap_err();
            assert!(matches!(err, RecognitionError::Decode(_)));
        }

        // Ingestion failed, so neither backend may have been called
        assert_eq!(classical.call_count(), 0);
        assert_eq!(neural.call_count(), 0);
    }

    #[test]
    fn test_valid_upload_reaches_selected_backend() {
        use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
        use std::io::Cursor;

        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(6, 6, Rgba([0, 0, 0, 255])));
        let mut png_bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .unwrap();

        let classical = StubRecognizer::new("tesseract", "hello world");
        let neural = StubRecognizer::new("trocr", "neural text");

        let text =
            recognize_upload(&png_bytes, RecognitionMode::ClassicalOcr, &classical, &neural)
                .unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(classical.call_count(), 1);
        assert_eq!(neural.call_count(), 0);
    }

    #[test]
    fn test_dispatch_is_deterministic_for_fixed_backend() {
        let classical = StubRecognizer::new("tesseract", "same text");
        let neural = StubRecognizer::new("trocr", "other");

        let a = dispatch(&test_image(), RecognitionMode::ClassicalOcr, &classical, &neural);
        let b = dispatch(&test_image(), RecognitionMode::ClassicalOcr, &classical, &neural);
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
