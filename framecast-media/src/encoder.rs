//! Raw frame to compressed image encoding
//!
//! Encoders are pure: they hold only immutable configuration, so a single
//! instance can be shared across threads and invoked on independent frames
//! concurrently.

use crate::error::{MediaError, MediaResult};
use bytes::Bytes;
use chrono::Utc;
use framecast_core::{EncodedFrame, Frame, ImageFormat, PixelFormat};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

/// Converts a raw frame into an upload-ready image
pub trait FrameEncoder: Send + Sync + std::fmt::Debug {
    /// Encode one frame, consuming its pixel buffer
    fn encode(&self, frame: Frame) -> MediaResult<EncodedFrame>;

    /// Output image format
    fn format(&self) -> ImageFormat;
}

/// Encoder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub format: ImageFormat,
    /// JPEG quality, 1..=100; ignored for PNG
    pub jpeg_quality: u8,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpeg,
            jpeg_quality: 80,
        }
    }
}

impl EncoderConfig {
    /// Validate configuration
    pub fn validate(&self) -> MediaResult<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MediaError::InvalidConfiguration {
                message: format!("JPEG quality {} outside 1..=100", self.jpeg_quality),
            });
        }
        Ok(())
    }
}

/// Decoded raster in a layout the image codecs accept
enum Raster {
    Rgb(RgbImage),
    Luma(GrayImage),
}

/// JPEG/PNG encoder backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageEncoder {
    config: EncoderConfig,
}

impl ImageEncoder {
    pub fn new(config: EncoderConfig) -> MediaResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn jpeg(quality: u8) -> MediaResult<Self> {
        Self::new(EncoderConfig {
            format: ImageFormat::Jpeg,
            jpeg_quality: quality,
        })
    }

    pub fn png() -> Self {
        Self {
            config: EncoderConfig {
                format: ImageFormat::Png,
                ..EncoderConfig::default()
            },
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn to_raster(frame: Frame) -> MediaResult<Raster> {
        let (width, height) = (frame.resolution.width, frame.resolution.height);
        let format = frame.format;
        let actual = frame.data.len();
        let mismatch = || MediaError::InvalidFrameData {
            expected: width as usize * height as usize * format.bytes_per_pixel(),
            actual,
        };

        match format {
            PixelFormat::Rgb24 => RgbImage::from_raw(width, height, frame.data)
                .map(Raster::Rgb)
                .ok_or_else(mismatch),
            PixelFormat::Bgr24 => {
                let mut data = frame.data;
                data.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
                RgbImage::from_raw(width, height, data)
                    .map(Raster::Rgb)
                    .ok_or_else(mismatch)
            }
            PixelFormat::Rgba32 => RgbaImage::from_raw(width, height, frame.data)
                .map(|rgba| Raster::Rgb(DynamicImage::ImageRgba8(rgba).to_rgb8()))
                .ok_or_else(mismatch),
            PixelFormat::Gray8 => GrayImage::from_raw(width, height, frame.data)
                .map(Raster::Luma)
                .ok_or_else(mismatch),
        }
    }

    fn compress(&self, raster: Raster) -> MediaResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let result = match self.config.format {
            ImageFormat::Jpeg => {
                let mut encoder =
                    JpegEncoder::new_with_quality(&mut buffer, self.config.jpeg_quality);
                match &raster {
                    Raster::Rgb(image) => encoder.encode_image(image),
                    Raster::Luma(image) => encoder.encode_image(image),
                }
            }
            ImageFormat::Png => {
                let dynamic = match raster {
                    Raster::Rgb(rgb) => DynamicImage::ImageRgb8(rgb),
                    Raster::Luma(luma) => DynamicImage::ImageLuma8(luma),
                };
                dynamic.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            }
        };

        result.map_err(|err| MediaError::EncodeFailed {
            format: self.config.format.extension().to_string(),
            reason: err.to_string(),
        })?;
        Ok(buffer)
    }
}

impl FrameEncoder for ImageEncoder {
    fn encode(&self, frame: Frame) -> MediaResult<EncodedFrame> {
        if frame.resolution.is_empty() {
            return Err(MediaError::InvalidDimensions {
                width: frame.resolution.width,
                height: frame.resolution.height,
            });
        }

        let expected = frame.expected_len();
        if frame.data.len() != expected {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: frame.data.len(),
            });
        }

        let (sequence, captured_at, resolution) =
            (frame.sequence, frame.captured_at, frame.resolution);
        let raster = Self::to_raster(frame)?;
        let payload = self.compress(raster)?;

        Ok(EncodedFrame {
            sequence,
            captured_at,
            encoded_at: Utc::now(),
            resolution,
            format: self.config.format,
            payload: Bytes::from(payload),
        })
    }

    fn format(&self) -> ImageFormat {
        self.config.format
    }
}

/// Async wrapper that runs a shared encoder on the blocking thread pool
#[derive(Debug, Clone)]
pub struct AsyncEncoder {
    inner: Arc<dyn FrameEncoder>,
}

impl AsyncEncoder {
    pub fn new(encoder: Arc<dyn FrameEncoder>) -> Self {
        Self { inner: encoder }
    }

    /// Encode off the async executor
    pub async fn encode(&self, frame: Frame) -> MediaResult<EncodedFrame> {
        let encoder = self.inner.clone();
        let format = encoder.format();

        tokio::task::spawn_blocking(move || encoder.encode(frame))
            .await
            .map_err(|e| MediaError::EncodeFailed {
                format: format.extension().to_string(),
                reason: format!("Thread pool error: {}", e),
            })?
    }

    pub fn format(&self) -> ImageFormat {
        self.inner.format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framecast_core::Resolution;

    fn frame(format: PixelFormat, width: u32, height: u32) -> Frame {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Frame {
            sequence: 9,
            captured_at: Utc::now(),
            resolution: Resolution::new(width, height),
            format,
            data: (0..len).map(|i| (i % 251) as u8).collect(),
        }
    }

    #[test]
    fn test_jpeg_output_has_soi_marker() {
        let encoder = ImageEncoder::jpeg(75).unwrap();
        let encoded = encoder.encode(frame(PixelFormat::Rgb24, 16, 8)).unwrap();

        assert_eq!(encoded.sequence, 9);
        assert_eq!(encoded.format, ImageFormat::Jpeg);
        assert_eq!(&encoded.payload[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_png_output_has_signature() {
        let encoded = ImageEncoder::png()
            .encode(frame(PixelFormat::Rgba32, 8, 8))
            .unwrap();
        assert_eq!(&encoded.payload[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let encoder = ImageEncoder::jpeg(80).unwrap();
        let mut bad = frame(PixelFormat::Rgb24, 4, 4);
        bad.resolution = Resolution::new(0, 4);

        let err = encoder.encode(bad).unwrap_err();
        assert!(matches!(err, MediaError::InvalidDimensions { width: 0, .. }));
        assert!(err.is_encode_error());
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let encoder = ImageEncoder::jpeg(80).unwrap();
        let mut bad = frame(PixelFormat::Bgr24, 4, 4);
        bad.data.truncate(10);

        match encoder.encode(bad) {
            Err(MediaError::InvalidFrameData { expected, actual }) => {
                assert_eq!(expected, 48);
                assert_eq!(actual, 10);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_encoder_runs_concurrently() {
        let encoder = AsyncEncoder::new(Arc::new(ImageEncoder::jpeg(60).unwrap()));
        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let encoder = encoder.clone();
                let mut input = frame(PixelFormat::Gray8, 16, 16);
                input.sequence = i;
                tokio::spawn(async move { encoder.encode(input).await })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let encoded = task.await.unwrap().unwrap();
            assert_eq!(encoded.sequence, i as u64);
        }
    }

    #[test]
    fn test_quality_bounds() {
        assert!(ImageEncoder::jpeg(0).is_err());
        assert!(ImageEncoder::jpeg(101).is_err());
        assert!(ImageEncoder::jpeg(100).is_ok());
    }
}
