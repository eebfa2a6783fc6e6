use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::models::{BuiltinModel, ModelInfo};

/// Environment variable overriding the cache root.
pub const CACHE_ENV: &str = "INKCHECK_CACHE";

const MODEL_FILE: &str = "model.onnx";
const DIGEST_FILE: &str = "model.onnx.sha256";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download failed with HTTP status {0}")]
    HttpStatus(u16),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Downloads, verifies and locates image encoder models on disk.
#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(CACHE_ENV) {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("inkcheck").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("inkcheck").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("inkcheck").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir, download_lock: Arc::new(Mutex::new(())) })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_path(&self, model: BuiltinModel) -> PathBuf {
        self.models_dir.join(model.get_model_info().name).join(MODEL_FILE)
    }

    fn get_digest_path(&self, model: BuiltinModel) -> PathBuf {
        self.models_dir.join(model.get_model_info().name).join(DIGEST_FILE)
    }

    pub fn is_model_downloaded(&self, model: BuiltinModel) -> bool {
        let model_path = self.get_model_path(model);
        log::debug!("Model path: {:?} (exists: {})", model_path, model_path.exists());
        model_path.exists()
    }

    /// The digest the model file must have: the pinned one, else the one recorded at
    /// download time.
    fn expected_hash(&self, model: BuiltinModel, info: &ModelInfo) -> Result<Option<String>, ModelError> {
        if let Some(hash) = &info.model_hash {
            return Ok(Some(hash.clone()));
        }
        let digest_path = self.get_digest_path(model);
        if !digest_path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(digest_path)?.trim().to_string()))
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Verifying {:?}: {} bytes, hash {} (expected {})", path, bytes.len(), hash, expected_hash);
        Ok(hash == expected_hash)
    }

    /// Checks the model file against its expected digest. A file with nothing to check
    /// against counts as unverified.
    pub fn verify_model(&self, model: BuiltinModel) -> Result<bool, ModelError> {
        let info = model.get_model_info();
        let model_path = self.get_model_path(model);
        if !model_path.exists() {
            log::info!("Model file {:?} does not exist", model_path);
            return Ok(false);
        }
        match self.expected_hash(model, &info)? {
            Some(expected) => self.verify_file(&model_path, &expected),
            None => {
                log::warn!("No recorded digest for {:?}", model_path);
                Ok(false)
            }
        }
    }

    pub async fn download_model(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let info = model.get_model_info();
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(&info.name);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        let model_path = self.get_model_path(model);
        if model_path.exists() && self.verify_model(model)? {
            log::info!("Existing model file verified successfully");
            return Ok(());
        }

        match self.download_and_verify(model, &info, &model_path).await {
            Ok(()) => {
                log::info!("Model ready to use at {:?}", model_path);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to set up model file: {}", e);
                let _ = self.remove_download(model);
                Err(e)
            }
        }
    }

    async fn download_and_verify(&self, model: BuiltinModel, info: &ModelInfo, path: &Path) -> Result<(), ModelError> {
        log::info!("Downloading model from {} to {:?}", info.model_url, path);
        let response = reqwest::get(&info.model_url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::HttpStatus(status.as_u16()));
        }
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if let Some(expected) = &info.model_hash {
            if &hash != expected {
                log::error!("Model hash mismatch: expected {}, got {}", expected, hash);
                return Err(ModelError::HashMismatch { expected: expected.clone(), actual: hash });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;
        fs::write(self.get_digest_path(model), &hash)?;

        if !self.verify_file(path, &hash)? {
            return Err(ModelError::VerificationFailed);
        }
        log::info!("Model file downloaded and verified successfully");
        Ok(())
    }

    pub fn remove_download(&self, model: BuiltinModel) -> Result<(), ModelError> {
        for path in [self.get_model_path(model), self.get_digest_path(model)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, model: BuiltinModel) -> Result<(), ModelError> {
        if !self.is_model_downloaded(model) {
            log::info!("Model {:?} not found, downloading...", model);
            return self.download_model(model).await;
        }
        if !self.verify_model(model)? {
            log::info!("Model {:?} failed verification, re-downloading...", model);
            self.remove_download(model)?;
            self.download_model(model).await?;
        }
        Ok(())
    }

    /// Path of a verified local model, without touching the network.
    pub fn require_model(&self, model: BuiltinModel) -> Result<PathBuf, ModelError> {
        let path = self.get_model_path(model);
        if !path.exists() {
            return Err(ModelError::NotDownloaded(format!(
                "{:?} is not downloaded; run `inkcheck download` first",
                model
            )));
        }
        if !self.verify_model(model)? {
            return Err(ModelError::VerificationFailed);
        }
        Ok(path)
    }
}
