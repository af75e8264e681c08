//! Webcam Uploader Demo
//!
//! Captures from a real camera via nokhwa and uploads each frame. Requires the
//! `camera` feature:
//!
//! ```text
//! cargo run -p framecast --features camera --example webcam_uploader -- [device-index] [seconds]
//! ```

use framecast::{
    init_logging, CameraSource, CaptureConfig, PipelineConfig, PipelineEvent, Resolution,
    Supervisor,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info")?;

    let mut args = std::env::args().skip(1);
    let device_index: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(0);
    let seconds: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(30);

    let config = PipelineConfig::from_env()?;

    println!("🎥 framecast webcam uploader");
    println!("============================");
    println!("📹 Camera index {device_index}");
    println!("📡 Endpoint: {}", config.endpoint);

    let source = CameraSource::open(CaptureConfig {
        resolution: Resolution::VGA,
        device_index,
        ..CaptureConfig::default()
    })?;

    let supervisor = Supervisor::start(config, source)?;
    let mut events = supervisor.subscribe_events();

    let watch = async {
        while let Some(event) = events.next().await {
            match event {
                PipelineEvent::DeviceSuspended { device, reason } => {
                    println!("⏸️  {device} unavailable: {reason}");
                }
                PipelineEvent::DeviceResumed { device } => println!("▶️  {device} is back"),
                PipelineEvent::UploadCompleted(result) if result.success => {
                    if let Some(name) = result.reply.and_then(|reply| reply.name) {
                        println!("✅ Frame {} stored as {name}", result.sequence);
                    }
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = watch => {}
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => println!("\n🛑 Interrupted"),
    }

    let report = supervisor.report();
    let snapshot = supervisor.stop().await;
    println!("\n📊 {:?} after {:.1}s", report.health(), snapshot.uptime.as_secs_f64());
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
