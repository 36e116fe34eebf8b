// Neural recognition backend - pretrained TrOCR encoder-decoder
// CPU-only ONNX inference with greedy autoregressive generation

use crate::core::config::TrocrConfig;
use crate::core::errors::{InferenceError, InferenceResult};
use crate::dispatch::TextRecognizer;
use image::DynamicImage;
use ndarray::Array4;
use once_cell::sync::OnceCell;
use ort::{session::Session, value::Value};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Encoder input dimensions (ViT patch grid of the pretrained checkpoint)
const INPUT_SIZE: u32 = 384;

/// Pixel normalization: (x/255 - MEAN) / STD, per the checkpoint's processor
const NORM_MEAN: f32 = 0.5;
const NORM_STD: f32 = 0.5;

/// Preprocess a bitmap into the encoder's expected tensor representation.
///
/// - Resize to 384x384 (the model takes a fixed patch grid, aspect ratio
///   is not preserved)
/// - Convert to RGB
/// - Normalize to [-1, 1] float32
/// - Return tensor in [1, 3, H, W] format
pub fn preprocess_image(image: &DynamicImage) -> InferenceResult<Array4<f32>> {
    let resized = image.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (pixel[c] as f32 / 255.0 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    Ok(tensor)
}

/// Argmax over the final timestep of a [.., seq, vocab] logits buffer.
pub fn argmax_last_step(logits: &[f32], vocab_size: usize) -> InferenceResult<u32> {
    if vocab_size == 0 || logits.len() < vocab_size {
        return Err(InferenceError::Generation(format!(
            "logits buffer too small: {} values for vocab size {}",
            logits.len(),
            vocab_size
        )));
    }

    let last_step = &logits[logits.len() - vocab_size..];
    let mut best_idx = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &val) in last_step.iter().enumerate() {
        if val > best_val {
            best_val = val;
            best_idx = i;
        }
    }

    Ok(best_idx as u32)
}

/// TrOCR service: loaded once, immutable thereafter.
///
/// Holds the preprocessor configuration implicitly (fixed input size and
/// normalization), the encoder/decoder ONNX sessions and the tokenizer.
#[derive(Debug)]
pub struct TrocrService {
    encoder: Mutex<Session>,
    decoder: Mutex<Session>,
    tokenizer: Tokenizer,
    decoder_start_token_id: u32,
    eos_token_id: u32,
    max_new_tokens: usize,
}

impl TrocrService {
    /// Load the pretrained artifact pair from disk.
    ///
    /// Expects `encoder.onnx`, `decoder.onnx` and `tokenizer.json` under
    /// the configured model directory.
    pub fn new(config: &TrocrConfig) -> InferenceResult<Self> {
        let encoder_path = config.model_dir.join("encoder.onnx");
        let decoder_path = config.model_dir.join("decoder.onnx");
        let tokenizer_path = config.model_dir.join("tokenizer.json");

        for path in [&encoder_path, &decoder_path, &tokenizer_path] {
            if !path.exists() {
                return Err(InferenceError::ModelNotFound {
                    path: path.display().to_string(),
                });
            }
        }

        info!("Loading TrOCR encoder from: {}", encoder_path.display());
        let encoder = Session::builder()?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&encoder_path)?;

        info!("Loading TrOCR decoder from: {}", decoder_path.display());
        let decoder = Session::builder()?
            .with_intra_threads(config.intra_threads)?
            .commit_from_file(&decoder_path)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        info!(
            "TrOCR service initialized: max_new_tokens={}, eos_token_id={}",
            config.max_new_tokens, config.eos_token_id
        );

        Ok(Self {
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
            tokenizer,
            decoder_start_token_id: config.decoder_start_token_id,
            eos_token_id: config.eos_token_id,
            max_new_tokens: config.max_new_tokens,
        })
    }

    /// Run the encoder once, returning the hidden-state buffer and its shape.
    fn encode(&self, tensor: Array4<f32>) -> InferenceResult<(Vec<usize>, Vec<f32>)> {
        let data_shape: Vec<usize> = tensor.shape().to_vec();
        let (data_flat, _offset) = tensor.into_raw_vec_and_offset();

        let shape_arr: [usize; 4] = [data_shape[0], data_shape[1], data_shape[2], data_shape[3]];
        let pixel_values = Value::from_array((shape_arr, data_flat))?;

        // Extract data while the session is held, then release
        let mut encoder = self.encoder.lock();
        let outputs = encoder.run(ort::inputs![pixel_values])?;

        let (shape, hidden_data) = if let Some(output) = outputs.get("last_hidden_state") {
            output.try_extract_tensor::<f32>()?
        } else {
            let first_key = outputs
                .keys()
                .next()
                .ok_or_else(|| InferenceError::Generation("no outputs from encoder".into()))?;
            outputs[first_key].try_extract_tensor::<f32>()?
        };

        let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 {
            return Err(InferenceError::Generation(format!(
                "unexpected encoder hidden-state shape: {:?}",
                dims
            )));
        }

        Ok((dims, hidden_data.to_vec()))
    }

    /// Run one decoder step over the whole generated prefix, returning the
    /// argmax token of the final position.
    fn decode_step(
        &self,
        generated: &[u32],
        hidden_dims: &[usize],
        hidden: &[f32],
    ) -> InferenceResult<u32> {
        let input_ids: Vec<i64> = generated.iter().map(|&t| t as i64).collect();
        let ids_value = Value::from_array(([1usize, input_ids.len()], input_ids))?;

        let hidden_shape: [usize; 3] = [hidden_dims[0], hidden_dims[1], hidden_dims[2]];
        let hidden_value = Value::from_array((hidden_shape, hidden.to_vec()))?;

        let (dims, logits) = {
            let mut decoder = self.decoder.lock();
            let outputs = decoder.run(ort::inputs![
                "input_ids" => ids_value,
                "encoder_hidden_states" => hidden_value
            ])?;

            let (shape, logits_data) = if let Some(output) = outputs.get("logits") {
                output.try_extract_tensor::<f32>()?
            } else {
                let first_key = outputs
                    .keys()
                    .next()
                    .ok_or_else(|| InferenceError::Generation("no outputs from decoder".into()))?;
                outputs[first_key].try_extract_tensor::<f32>()?
            };

            let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
            (dims, logits_data.to_vec())
        };

        let vocab_size = match dims.as_slice() {
            // [1, seq, vocab]
            [1, _, v] => *v,
            // [seq, vocab]
            [_, v] => *v,
            _ => {
                return Err(InferenceError::Generation(format!(
                    "unexpected logits shape: {:?}",
                    dims
                )))
            }
        };

        argmax_last_step(&logits, vocab_size)
    }

    /// Run recognition on a single bitmap.
    ///
    /// Preprocess, encode once, then greedily generate token ids until EOS
    /// or the token budget, and decode the sequence with special tokens
    /// stripped.
    pub fn recognize_text(&self, image: &DynamicImage) -> InferenceResult<String> {
        let tensor = preprocess_image(image)?;
        let (hidden_dims, hidden) = self.encode(tensor)?;

        let mut generated: Vec<u32> = vec![self.decoder_start_token_id];
        for _ in 0..self.max_new_tokens {
            let next_token = self.decode_step(&generated, &hidden_dims, &hidden)?;
            if next_token == self.eos_token_id {
                break;
            }
            generated.push(next_token);
        }

        // Skip the start token; decode with skip_special_tokens=true
        let text = self
            .tokenizer
            .decode(&generated[1..], true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        let text = text.trim().to_string();
        debug!("TrOCR generated {} tokens: '{}'", generated.len() - 1, text);
        Ok(text)
    }
}

/// Check whether the pretrained artifacts are present on disk.
pub fn is_trocr_available(model_dir: &Path) -> bool {
    model_dir.join("encoder.onnx").exists()
        && model_dir.join("decoder.onnx").exists()
        && model_dir.join("tokenizer.json").exists()
}

/// Init-once handle for the neural backend.
///
/// Constructed cheaply at startup and passed into dispatch; the heavy model
/// load happens on the first neural-mode request and at most once per
/// process, no matter how many sessions the server is serving.
pub struct TrocrHandle {
    config: TrocrConfig,
    cell: OnceCell<Arc<TrocrService>>,
}

impl TrocrHandle {
    pub fn new(config: TrocrConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Get the memoized service, loading it on first use.
    pub fn get(&self) -> InferenceResult<Arc<TrocrService>> {
        self.cell
            .get_or_try_init(|| {
                info!("Initializing TrOCR service (first neural-mode request)");
                TrocrService::new(&self.config).map(Arc::new)
            })
            .map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn is_available(&self) -> bool {
        is_trocr_available(&self.config.model_dir)
    }
}

impl TextRecognizer for TrocrHandle {
    fn name(&self) -> &'static str {
        "trocr"
    }

    fn recognize(&self, image: &DynamicImage) -> crate::core::errors::DispatchResult<String> {
        let service = self.get()?;
        service.recognize_text(image).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn test_config(dir: &str) -> TrocrConfig {
        TrocrConfig {
            model_dir: PathBuf::from(dir),
            max_new_tokens: 8,
            decoder_start_token_id: 2,
            eos_token_id: 2,
            intra_threads: 1,
        }
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 40, Rgb([255, 255, 255])));
        let tensor = preprocess_image(&img).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 384, 384]);
        // White pixels normalize to (1.0 - 0.5) / 0.5 = 1.0
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_black_normalizes_to_minus_one() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])));
        let tensor = preprocess_image(&img).unwrap();
        assert!((tensor[[0, 1, 100, 100]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_picks_last_timestep() {
        // Two timesteps, vocab of 3; only the last step should matter
        let logits = vec![9.0, 0.0, 0.0, 0.1, 0.7, 0.2];
        assert_eq!(argmax_last_step(&logits, 3).unwrap(), 1);
    }

    #[test]
    fn test_argmax_rejects_short_buffer() {
        let logits = vec![0.1, 0.2];
        assert!(argmax_last_step(&logits, 3).is_err());
    }

    #[test]
    fn test_missing_model_yields_model_not_found() {
        let err = TrocrService::new(&test_config("definitely/missing/dir")).unwrap_err();
        assert!(matches!(err, InferenceError::ModelNotFound { .. }));
    }

    #[test]
    fn test_handle_reports_unavailable_without_artifacts() {
        let handle = TrocrHandle::new(test_config("definitely/missing/dir"));
        assert!(!handle.is_available());
        assert!(!handle.is_initialized());
        // A failed init must not mark the cell as initialized
        assert!(handle.get().is_err());
        assert!(!handle.is_initialized());
    }
}
