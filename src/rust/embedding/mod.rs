mod onnx;
mod pixel_grid;

use ndarray::Array1;

use crate::canvas::Canvas;
use crate::classifier::AssessmentError;

pub use onnx::{OnnxImageEmbedder, CLIP_MEAN, CLIP_STD};
pub use pixel_grid::PixelGridEmbedder;

/// Turns a drawing into a fixed-length unit vector.
///
/// Implementations must be deterministic: the same canvas always yields the same vector,
/// so that cosine similarity (a plain dot product) is meaningful between a drawing and the
/// reference embeddings computed at warm-up.
///
/// Providers are shared between request threads. A provider whose backend is not
/// reentrant must serialise calls internally; callers never add their own locking.
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector returned by [`embed`](Self::embed).
    fn embedding_size(&self) -> usize;

    /// Short name for logs.
    fn name(&self) -> &str;

    /// Embeds a canvas into a unit-norm vector.
    ///
    /// # Errors
    /// - `Input` if the canvas cannot be embedded (e.g. zero-sized)
    /// - `Embedding`/`Model` if the backend fails
    fn embed(&self, canvas: &Canvas) -> Result<Array1<f32>, AssessmentError>;
}
