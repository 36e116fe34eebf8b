use crate::core::errors::ConfigError;
use std::env;
use std::path::PathBuf;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Classical OCR engine configuration
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// ISO 639-2 language code passed to the engine
    pub language: String,
}

/// Neural backend configuration
#[derive(Debug, Clone)]
pub struct TrocrConfig {
    /// Directory holding encoder.onnx, decoder.onnx and tokenizer.json
    pub model_dir: PathBuf,
    /// Termination bound for the autoregressive loop
    pub max_new_tokens: usize,
    /// First id fed to the decoder (TrOCR checkpoint default: 2)
    pub decoder_start_token_id: u32,
    /// Id that stops generation (TrOCR checkpoint default: 2)
    pub eos_token_id: u32,
    /// ONNX Runtime intra-op threads per session
    pub intra_threads: usize,
}

/// Upload handling configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_upload_bytes: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub tesseract: TesseractConfig,
    pub trocr: TrocrConfig,
    pub upload: UploadConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        // Parse log level
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            tesseract: TesseractConfig {
                language: env::var("TESSERACT_LANG").unwrap_or_else(|_| "eng".to_string()),
            },
            trocr: TrocrConfig {
                model_dir: env::var("TROCR_MODEL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("models/trocr")),
                max_new_tokens: env::var("MAX_NEW_TOKENS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(128),
                decoder_start_token_id: env::var("DECODER_START_TOKEN_ID")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
                eos_token_id: env::var("EOS_TOKEN_ID")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
                intra_threads: env::var("ORT_INTRA_THREADS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        // Default: half the cores, at least 2
                        let cores = num_cpus::get();
                        std::cmp::max(cores / 2, 2)
                    }),
            },
            upload: UploadConfig {
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10 * 1024 * 1024),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tesseract.language.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }

        if self.trocr.max_new_tokens == 0 {
            return Err(ConfigError::InvalidMaxNewTokens(self.trocr.max_new_tokens));
        }

        if self.trocr.intra_threads == 0 {
            return Err(ConfigError::InvalidThreadCount(self.trocr.intra_threads));
        }

        if self.upload.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit(self.upload.max_upload_bytes));
        }

        // The model directory is deliberately not checked here: a checkout
        // without artifacts must still start, serve Tesseract mode, and
        // report neural unavailability per request and via /health.

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn tesseract_language(&self) -> &str {
        &self.tesseract.language
    }

    pub fn trocr_model_dir(&self) -> &std::path::Path {
        &self.trocr.model_dir
    }

    pub fn max_new_tokens(&self) -> usize {
        self.trocr.max_new_tokens
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.upload.max_upload_bytes
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors
