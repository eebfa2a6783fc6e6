use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::DynamicImage;
use log::info;
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::value::Tensor;

use super::EmbeddingProvider;
use crate::canvas::Canvas;
use crate::classifier::utils::normalize_vector;
use crate::classifier::AssessmentError;
use crate::models::{BuiltinModel, ModelCharacteristics};
use crate::runtime::{create_session_builder, RuntimeConfig};
use crate::ModelManager;

/// Per-channel mean used by CLIP preprocessing.
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
/// Per-channel standard deviation used by CLIP preprocessing.
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Preferred output of exported CLIP vision towers; falls back to the first output.
const EMBEDS_OUTPUT: &str = "image_embeds";

/// Image encoder backed by an ONNX Runtime session.
///
/// The model is expected to:
/// - Accept one input of shape `[1, 3, S, S]` (CLIP-normalised RGB, NCHW)
/// - Output either `[1, D]` pooled embeddings or `[1, T, D]` hidden states, in which
///   case the first token is used
///
/// Sessions are not assumed to be reentrant, so calls to [`embed`](EmbeddingProvider::embed)
/// are serialised through a mutex.
#[derive(Debug)]
pub struct OnnxImageEmbedder {
    session: Mutex<Session>,
    input_name: String,
    output_index: usize,
    characteristics: ModelCharacteristics,
}

impl OnnxImageEmbedder {
    /// Loads a built-in model that the [`ModelManager`] has already downloaded.
    pub fn from_builtin(
        model: BuiltinModel,
        manager: &ModelManager,
        runtime: &RuntimeConfig,
    ) -> Result<Self, AssessmentError> {
        let path = manager
            .require_model(model)
            .map_err(|e| AssessmentError::ProviderUnavailable(e.to_string()))?;
        Self::from_file(&path, model.characteristics(), runtime)
    }

    /// Loads a custom image encoder.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        characteristics: ModelCharacteristics,
        runtime: &RuntimeConfig,
    ) -> Result<Self, AssessmentError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssessmentError::ProviderUnavailable(format!("Model file not found: {}", path.display())));
        }
        let session = create_session_builder(runtime)?.commit_from_file(path)?;
        Self::validate_model(&session)?;

        let input_name = session.inputs[0].name.clone();
        let output_index = session.outputs.iter().position(|o| o.name == EMBEDS_OUTPUT).unwrap_or(0);
        info!(
            "Loaded image encoder {:?} (input '{}', output '{}')",
            path, input_name, session.outputs[output_index].name
        );

        Ok(Self { session: Mutex::new(session), input_name, output_index, characteristics })
    }

    fn validate_model(session: &Session) -> Result<(), AssessmentError> {
        if session.inputs.is_empty() {
            return Err(AssessmentError::Model("Model must have an image input".into()));
        }
        if session.outputs.is_empty() {
            return Err(AssessmentError::Model("Model must have at least 1 output for embeddings".into()));
        }
        Ok(())
    }

    /// Resizes to the model input and normalises with CLIP statistics, as NCHW.
    pub fn preprocess(canvas: &Canvas, size: u32) -> Array4<f32> {
        let resized = DynamicImage::ImageLuma8(canvas.gray().clone())
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8();
        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (pixel.0[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
            }
        }
        tensor
    }
}

impl EmbeddingProvider for OnnxImageEmbedder {
    fn embedding_size(&self) -> usize {
        self.characteristics.embedding_size
    }

    fn name(&self) -> &str {
        "onnx"
    }

    fn embed(&self, canvas: &Canvas) -> Result<Array1<f32>, AssessmentError> {
        let (w, h) = canvas.dimensions();
        if w == 0 || h == 0 {
            return Err(AssessmentError::Input("Canvas has zero dimensions".into()));
        }

        let input = Self::preprocess(canvas, self.characteristics.input_size).into_dyn();
        let input = input.as_standard_layout();
        let mut inputs = HashMap::new();
        inputs.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input)
                .map_err(|e| AssessmentError::Model(format!("Failed to create input tensor: {}", e)))?,
        );

        let session = self
            .session
            .lock()
            .map_err(|_| AssessmentError::Embedding("Encoder session lock poisoned".into()))?;
        let outputs = session
            .run(inputs)
            .map_err(|e| AssessmentError::Model(format!("Failed to run model: {}", e)))?;
        let output = outputs[self.output_index]
            .try_extract_tensor::<f32>()
            .map_err(|e| AssessmentError::Model(format!("Failed to extract output tensor: {}", e)))?;

        let embedding: Array1<f32> = match output.ndim() {
            2 => output.slice(ndarray::s![0, ..]).iter().copied().collect(),
            3 => output.slice(ndarray::s![0, 0, ..]).iter().copied().collect(),
            n => {
                return Err(AssessmentError::Model(format!("Unexpected output rank {}", n)));
            }
        };
        if embedding.len() != self.characteristics.embedding_size {
            return Err(AssessmentError::Model(format!(
                "Expected {}-dimensional embeddings, model produced {}",
                self.characteristics.embedding_size,
                embedding.len()
            )));
        }
        Ok(normalize_vector(&embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_preprocess_shape_and_normalisation() {
        let canvas = Canvas::from_gray(GrayImage::from_pixel(64, 32, Luma([255])));
        let tensor = OnnxImageEmbedder::preprocess(&canvas, 224);
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        for c in 0..3 {
            let expected = (1.0 - CLIP_MEAN[c]) / CLIP_STD[c];
            assert!((tensor[[0, c, 100, 100]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_missing_model_file() {
        let result = OnnxImageEmbedder::from_file(
            "/nonexistent/model.onnx",
            BuiltinModel::ClipVitB32.characteristics(),
            &RuntimeConfig::default(),
        );
        assert!(matches!(result, Err(AssessmentError::ProviderUnavailable(_))));
    }
}
