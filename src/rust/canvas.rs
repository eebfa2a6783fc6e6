use std::io::Cursor;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use crate::classifier::AssessmentError;

/// Gray levels below this count as ink.
pub const INK_LEVEL: u8 = 200;

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// A decoded drawing: 8-bit grayscale, white paper, dark ink.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    gray: GrayImage,
}

impl Canvas {
    pub fn from_gray(gray: GrayImage) -> Self {
        Self { gray }
    }

    /// Decodes PNG or JPEG bytes. Transparent pixels are laid over white paper.
    pub fn decode(bytes: &[u8]) -> Result<Self, AssessmentError> {
        if bytes.is_empty() {
            return Err(AssessmentError::Input("Image data is empty".into()));
        }
        let image = image::load_from_memory(bytes)?;
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(AssessmentError::Input("Image has zero dimensions".into()));
        }

        let rgba = image.to_rgba8();
        let gray = GrayImage::from_fn(width, height, |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = a as f32 / 255.0;
            let over_white = |c: u8| c as f32 * alpha + 255.0 * (1.0 - alpha);
            let luma = 0.299 * over_white(r) + 0.587 * over_white(g) + 0.114 * over_white(b);
            Luma([luma.round().clamp(0.0, 255.0) as u8])
        });
        Ok(Self { gray })
    }

    /// Decodes base64 text, optionally wrapped in a `data:image/...;base64,` URL.
    /// Whitespace, the URL-safe alphabet and missing padding are all accepted.
    pub fn decode_base64(text: &str) -> Result<Self, AssessmentError> {
        let payload = match text.trim().strip_prefix("data:") {
            Some(rest) => rest
                .split_once(',')
                .map(|(_, data)| data)
                .ok_or_else(|| AssessmentError::Input("Data URL has no payload".into()))?,
            None => text,
        };
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = URL_SAFE_LENIENT
            .decode(&cleaned)
            .or_else(|_| STANDARD_LENIENT.decode(&cleaned))
            .map_err(|e| AssessmentError::Input(format!("Failed to decode base64: {}", e)))?;
        Self::decode(&bytes)
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn into_gray(self) -> GrayImage {
        self.gray
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }

    /// True when no pixel is dark enough to be ink.
    pub fn is_blank(&self) -> bool {
        !self.gray.pixels().any(|p| p.0[0] < INK_LEVEL)
    }

    /// Inclusive bounding box `(x0, y0, x1, y1)` of the ink, if any.
    pub fn ink_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, p) in self.gray.enumerate_pixels() {
            if p.0[0] >= INK_LEVEL {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds
    }

    /// PNG encoding of the canvas.
    pub fn to_png(&self) -> Result<Vec<u8>, AssessmentError> {
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(self.gray.clone()).write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }
}

impl From<GrayImage> for Canvas {
    fn from(gray: GrayImage) -> Self {
        Self::from_gray(gray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
    use image::{Rgba, RgbaImage};

    fn sample() -> Canvas {
        Canvas::from_gray(GrayImage::from_fn(20, 10, |x, y| {
            if (5..8).contains(&x) && (2..4).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        }))
    }

    #[test]
    fn test_png_round_trip_and_bounds() {
        let canvas = sample();
        let decoded = Canvas::decode(&canvas.to_png().unwrap()).unwrap();
        assert_eq!(decoded, canvas);
        assert_eq!(decoded.ink_bounds(), Some((5, 2, 7, 3)));
        assert!(!decoded.is_blank());
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let rgba = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(rgba).write_to(&mut bytes, ImageFormat::Png).unwrap();
        let canvas = Canvas::decode(&bytes.into_inner()).unwrap();
        assert!(canvas.is_blank());
        assert_eq!(canvas.ink_bounds(), None);
    }

    #[test]
    fn test_base64_variants() {
        let png = sample().to_png().unwrap();
        let plain = STANDARD.encode(&png);
        let url_safe = URL_SAFE_NO_PAD.encode(&png);
        let data_url = format!("data:image/png;base64,{}", plain);
        let wrapped: String = plain.chars().enumerate().flat_map(|(i, c)| {
            if i % 60 == 59 { vec![c, '\n'] } else { vec![c] }
        }).collect();

        let unpadded = STANDARD_NO_PAD.encode(&png);
        let url_padded = URL_SAFE.encode(&png);

        for text in [plain, url_safe, data_url, wrapped, unpadded, url_padded] {
            assert_eq!(Canvas::decode_base64(&text).unwrap(), sample());
        }
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(Canvas::decode(&[]), Err(AssessmentError::Input(_))));
        assert!(matches!(Canvas::decode(b"not an image"), Err(AssessmentError::Input(_))));
        assert!(matches!(Canvas::decode_base64("@@@"), Err(AssessmentError::Input(_))));
        assert!(matches!(Canvas::decode_base64("data:image/png;base64"), Err(AssessmentError::Input(_))));
    }
}
