use ndarray::Array1;

use super::EmbeddingProvider;
use crate::canvas::{Canvas, INK_LEVEL};
use crate::classifier::utils::normalize_vector;
use crate::classifier::AssessmentError;

/// Model-free embedder: the ink density of an `N × N` grid laid over the drawing.
///
/// The grid covers a square around the ink's bounding box, so the vector ignores where
/// on the canvas the child drew and how large, but keeps the aspect ratio. Cheap and fully
/// deterministic; used offline and in tests.
#[derive(Debug, Clone)]
pub struct PixelGridEmbedder {
    grid: usize,
}

impl Default for PixelGridEmbedder {
    fn default() -> Self {
        Self { grid: 16 }
    }
}

impl PixelGridEmbedder {
    pub fn new(grid: usize) -> Self {
        Self { grid: grid.max(2) }
    }
}

impl EmbeddingProvider for PixelGridEmbedder {
    fn embedding_size(&self) -> usize {
        self.grid * self.grid
    }

    fn name(&self) -> &str {
        "pixel-grid"
    }

    fn embed(&self, canvas: &Canvas) -> Result<Array1<f32>, AssessmentError> {
        let (x0, y0, x1, y1) = canvas
            .ink_bounds()
            .ok_or_else(|| AssessmentError::Input("Canvas has no ink to embed".into()))?;

        let (w, h) = ((x1 - x0 + 1) as f64, (y1 - y0 + 1) as f64);
        let side = w.max(h);
        let left = x0 as f64 + (w - side) / 2.0;
        let top = y0 as f64 + (h - side) / 2.0;
        let n = self.grid;

        let mut cells = Array1::<f32>::zeros(n * n);
        let gray = canvas.gray();
        for y in y0..=y1 {
            let row = (((y as f64 + 0.5 - top) / side) * n as f64) as usize;
            for x in x0..=x1 {
                let value = gray.get_pixel(x, y).0[0];
                if value >= INK_LEVEL {
                    continue;
                }
                let col = (((x as f64 + 0.5 - left) / side) * n as f64) as usize;
                let index = row.min(n - 1) * n + col.min(n - 1);
                cells[index] += (255 - value) as f32 / 255.0;
            }
        }
        Ok(normalize_vector(&cells))
    }
}
