/// Image encoders the model manager knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModel {
    /// Vision tower of CLIP ViT-B/32, exported to ONNX
    ClipVitB32,
}

/// Where a model comes from and how to check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Directory name under the models cache
    pub name: String,
    pub model_url: String,
    /// Pinned SHA-256 of the ONNX file. When absent, the digest of the first verified
    /// download is recorded next to the file and enforced from then on.
    pub model_hash: Option<String>,
}

/// Shape facts the embedder needs without opening the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCharacteristics {
    pub embedding_size: usize,
    /// Side of the square input image
    pub input_size: u32,
    pub model_size_mb: usize,
}

impl BuiltinModel {
    pub fn get_model_info(&self) -> ModelInfo {
        match self {
            BuiltinModel::ClipVitB32 => ModelInfo {
                name: "clip-vit-b32-vision".to_string(),
                model_url: "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main/onnx/vision_model.onnx"
                    .to_string(),
                model_hash: None,
            },
        }
    }

    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            BuiltinModel::ClipVitB32 => ModelCharacteristics {
                embedding_size: 512,
                input_size: 224,
                model_size_mb: 352,
            },
        }
    }
}
