//! Integration tests for capture sources and encoding
//!
//! These tests drive the synthetic source through the image encoder the way
//! the pipeline does, including device outages and malformed frames.

use framecast_core::{ImageFormat, PixelFormat, Resolution};
use framecast_media::*;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// CAPTURE LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_capture_config_default() {
    let config = CaptureConfig::default();

    assert_eq!(config.resolution, Resolution::VGA);
    assert_eq!(config.pixel_format, PixelFormat::Rgb24);
    assert_eq!(config.device_index, 0);
}

#[test]
fn test_synthetic_source_rejects_empty_resolution() {
    let result = SyntheticSource::new(CaptureConfig {
        resolution: Resolution::new(640, 0),
        ..CaptureConfig::default()
    });
    assert!(matches!(
        result,
        Err(MediaError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_sequence_numbers_strictly_increase_across_outage() {
    let mut source = SyntheticSource::qvga();
    let control = source.control();
    let mut sequences = Vec::new();

    for tick in 0..20 {
        if tick == 5 {
            control.disconnect();
        }
        if tick == 9 {
            control.reconnect();
        }
        if let Ok(frame) = source.next_frame() {
            sequences.push(frame.sequence);
        }
    }

    assert_eq!(sequences.len(), 16);
    assert!(sequences.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_readiness_watcher_follows_control() {
    let source = SyntheticSource::qvga();
    let control = source.control();
    let mut watcher = source.readiness();

    control.disconnect();
    assert!(!watcher.is_ready());

    let waiter = tokio::spawn(async move {
        tokio::time::timeout(Duration::from_secs(1), watcher.wait_ready()).await
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    control.reconnect();

    assert_eq!(waiter.await.unwrap(), Ok(true));
}

// ============================================================================
// ENCODING TESTS
// ============================================================================

#[test]
fn test_encoder_config_default() {
    let config = EncoderConfig::default();
    assert_eq!(config.format, ImageFormat::Jpeg);
    assert_eq!(config.jpeg_quality, 80);
    assert!(config.validate().is_ok());
}

#[test]
fn test_every_pixel_format_encodes() {
    let encoder = ImageEncoder::jpeg(70).unwrap();

    for pixel_format in [
        PixelFormat::Rgb24,
        PixelFormat::Bgr24,
        PixelFormat::Rgba32,
        PixelFormat::Gray8,
    ] {
        let mut source = SyntheticSource::new(CaptureConfig {
            resolution: Resolution::new(32, 24),
            pixel_format,
            device_index: 0,
        })
        .unwrap();

        let encoded = encoder.encode(source.next_frame().unwrap()).unwrap();
        assert_eq!(encoded.resolution, Resolution::new(32, 24));
        assert!(!encoded.is_empty(), "{pixel_format:?} produced no bytes");
    }
}

#[test]
fn test_malformed_frame_is_an_encode_error() {
    let mut source = SyntheticSource::qvga();
    source.control().emit_malformed(1);
    let encoder = ImageEncoder::png();

    let err = encoder.encode(source.next_frame().unwrap()).unwrap_err();
    assert!(err.is_encode_error());

    // The next frame is unaffected
    let encoded = encoder.encode(source.next_frame().unwrap()).unwrap();
    assert_eq!(encoded.sequence, 2);
    assert_eq!(encoded.format, ImageFormat::Png);
}

#[test]
fn test_shared_encoder_across_threads() {
    let encoder: Arc<dyn FrameEncoder> = Arc::new(ImageEncoder::jpeg(50).unwrap());
    let mut source = SyntheticSource::qvga();
    let frames: Vec<_> = (0..4).map(|_| source.next_frame().unwrap()).collect();

    let handles: Vec<_> = frames
        .into_iter()
        .map(|frame| {
            let encoder = encoder.clone();
            std::thread::spawn(move || encoder.encode(frame))
        })
        .collect();

    let mut sequences: Vec<u64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap().sequence)
        .collect();
    sequences.sort_unstable();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}
