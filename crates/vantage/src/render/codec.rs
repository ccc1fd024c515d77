//! # Still-Image Codec
//!
//! Pull delivery compresses each frame through an opaque
//! `compress(image) -> bytes` boundary. The bundled codec quantizes channel
//! values by a fixed step (lossy) and packs the result as PNG.

use std::io::Cursor;

use crate::errors::ViewerError;
use crate::render::session::Frame;

/// Quantization step used for pull-delivery frames, in normalized units.
pub const DEFAULT_QUANTIZATION_STEP: f64 = 0.02;

/// Opaque frame compression boundary.
pub trait FrameCodec: Send + Sync {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ViewerError>;
}

/// Lossy quantize-then-PNG codec.
#[derive(Debug, Clone)]
pub struct QuantizingPngCodec {
    quantization_step: f64,
}

impl Default for QuantizingPngCodec {
    fn default() -> Self {
        Self {
            quantization_step: DEFAULT_QUANTIZATION_STEP,
        }
    }
}

impl QuantizingPngCodec {
    pub fn new(quantization_step: f64) -> Result<Self, ViewerError> {
        if !(quantization_step > 0.0 && quantization_step <= 1.0) {
            return Err(ViewerError::Encode(format!(
                "quantization step {} outside (0, 1]",
                quantization_step
            )));
        }
        Ok(Self { quantization_step })
    }

    fn quantize(&self, value: u8) -> u8 {
        let step = (self.quantization_step * 255.0).max(1.0);
        ((f64::from(value) / step).round() * step).clamp(0.0, 255.0) as u8
    }
}

impl FrameCodec for QuantizingPngCodec {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ViewerError> {
        let quantized: Vec<u8> = frame.data.iter().map(|&v| self.quantize(v)).collect();
        let rgba = image::RgbaImage::from_raw(frame.width, frame.height, quantized)
            .ok_or_else(|| {
                ViewerError::Encode(format!(
                    "buffer of {} bytes does not fill {}x{}",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ))
            })?;

        let mut encoded = Vec::new();
        image::DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
            .map_err(|e| ViewerError::Encode(e.to_string()))?;
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;

    fn frame(width: u32, height: u32, data: Vec<u8>) -> Frame {
        Frame {
            width,
            height,
            data: Bytes::from(data),
            captured_at: Utc::now(),
            render_seconds: 0.01,
        }
    }

    #[test]
    fn encodes_png() {
        let data: Vec<u8> = (0..8 * 8 * 4).map(|i| (i % 256) as u8).collect();
        let encoded = QuantizingPngCodec::default()
            .encode(&frame(8, 8, data))
            .unwrap();
        assert_eq!(&encoded[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn quantization_collapses_nearby_values() {
        let codec = QuantizingPngCodec::default();
        // One step is ~5 levels at 0.02; neighbors land on the same rung.
        assert_eq!(codec.quantize(100), codec.quantize(101));
        assert_eq!(codec.quantize(0), 0);
        assert_eq!(codec.quantize(255), 255);
    }

    #[test]
    fn rejects_short_buffers_and_bad_steps() {
        let codec = QuantizingPngCodec::default();
        assert!(matches!(
            codec.encode(&frame(8, 8, vec![0u8; 16])),
            Err(ViewerError::Encode(_))
        ));
        assert!(QuantizingPngCodec::new(0.0).is_err());
        assert!(QuantizingPngCodec::new(1.5).is_err());
        assert!(QuantizingPngCodec::new(0.02).is_ok());
    }
}
