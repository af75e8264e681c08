//! Raw and encoded frame types
//!
//! A [`Frame`] is produced by a capture source and owned by it until it is
//! handed to an encoder. The encoder turns it into an [`EncodedFrame`], whose
//! ownership then moves into the upload queue and finally to a worker.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw pixel layouts a capture source may deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit red, green, blue
    Rgb24,
    /// 8-bit red, green, blue, alpha
    Rgba32,
    /// 8-bit blue, green, red
    Bgr24,
    /// 8-bit luma
    Gray8,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 1280x720
    pub const HD: Self = Self::new(1280, 720);
    /// 640x480
    pub const VGA: Self = Self::new(640, 480);
    /// 320x240
    pub const QVGA: Self = Self::new(320, 240);

    /// Total pixels in one frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Compressed image formats an encoder can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossy JPEG with a quality setting
    #[default]
    Jpeg,
    /// Lossless PNG
    Png,
}

impl ImageFormat {
    /// MIME type sent with the upload
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }
}

/// A raw frame straight from a capture source
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture order, strictly increasing per source
    pub sequence: u64,
    /// Wall-clock capture time
    pub captured_at: DateTime<Utc>,
    /// Frame dimensions
    pub resolution: Resolution,
    /// Layout of `data`
    pub format: PixelFormat,
    /// Tightly packed pixel rows
    pub data: Vec<u8>,
}

impl Frame {
    /// Buffer length implied by resolution and pixel format
    pub fn expected_len(&self) -> usize {
        self.resolution.pixel_count() * self.format.bytes_per_pixel()
    }
}

/// A frame after image encoding, ready for upload
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Sequence of the source frame
    pub sequence: u64,
    /// When the source frame was captured
    pub captured_at: DateTime<Utc>,
    /// When encoding finished
    pub encoded_at: DateTime<Utc>,
    /// Frame dimensions
    pub resolution: Resolution,
    /// Encoded image format
    pub format: ImageFormat,
    /// Encoded image bytes
    pub payload: Bytes,
}

impl EncodedFrame {
    /// File name used for the multipart part, e.g. `frame-00000042.jpg`
    pub fn file_name(&self) -> String {
        format!("frame-{:08}.{}", self.sequence, self.format.extension())
    }

    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True for an empty payload
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Hands out strictly increasing sequence numbers, starting at 1
#[derive(Debug, Default)]
pub struct SequenceCounter {
    last: u64,
}

impl SequenceCounter {
    /// Create a counter whose first value is 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number
    pub fn next(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Last sequence number handed out (0 if none)
    pub fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_len() {
        let frame = Frame {
            sequence: 1,
            captured_at: Utc::now(),
            resolution: Resolution::new(4, 2),
            format: PixelFormat::Rgba32,
            data: vec![0; 32],
        };
        assert_eq!(frame.expected_len(), 32);
    }

    #[test]
    fn test_file_name() {
        let frame = EncodedFrame {
            sequence: 42,
            captured_at: Utc::now(),
            encoded_at: Utc::now(),
            resolution: Resolution::QVGA,
            format: ImageFormat::Png,
            payload: Bytes::from_static(b"png"),
        };
        assert_eq!(frame.file_name(), "frame-00000042.png");
    }

    #[test]
    fn test_sequence_counter_starts_at_one() {
        let mut counter = SequenceCounter::new();
        assert_eq!(counter.last(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.last(), 2);
    }

    #[test]
    fn test_empty_resolution() {
        assert!(Resolution::new(0, 480).is_empty());
        assert!(!Resolution::VGA.is_empty());
        assert_eq!(Resolution::VGA.to_string(), "640x480");
    }
}
