//! Synthetic Uploader Demo
//!
//! Runs the full pipeline against a synthetic test pattern, no camera needed.
//! Point it at any endpoint that accepts a multipart `frame` field:
//!
//! ```text
//! FRAMECAST_ENDPOINT=http://127.0.0.1:5000/receive_frame \
//!     cargo run -p framecast --example synthetic_uploader -- [config.json] [seconds]
//! ```
//!
//! Settings come from the optional JSON file, overlaid with `FRAMECAST_*`
//! environment variables.

use anyhow::Context;
use framecast::{
    init_logging, MetricsReporter, PipelineConfig, PipelineEvent, Supervisor, SyntheticSource,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("info")?;

    let mut args = std::env::args().skip(1);
    let mut config = match args.next() {
        Some(path) if path.ends_with(".json") => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("loading {path}"))?,
        _ => PipelineConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    let seconds: u64 = std::env::args()
        .skip(1)
        .find_map(|arg| arg.parse().ok())
        .unwrap_or(10);

    println!("🎞️  framecast synthetic uploader");
    println!("=================================");
    println!("📡 Endpoint:  {}", config.endpoint);
    println!(
        "⚙️  {:.1} fps, queue {} ({:?}), {} workers",
        config.target_frame_rate, config.queue_capacity, config.drop_policy, config.worker_count
    );
    println!("⏱️  Running for {seconds}s\n");

    let supervisor = Supervisor::start(config, SyntheticSource::qvga())?;

    let reporter_cancel = CancellationToken::new();
    let reporter = MetricsReporter::new(supervisor.metrics_handle(), Duration::from_secs(2))
        .spawn(reporter_cancel.clone());

    let mut events = supervisor.subscribe_events();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!("\n🛑 Interrupted");
                break;
            }
            event = events.next() => match event {
                Some(PipelineEvent::UploadCompleted(result)) if !result.success => {
                    println!("❌ Frame {} failed after {} attempts: {:?}", result.sequence, result.attempts, result.error);
                }
                Some(PipelineEvent::EncodeFailed { sequence, reason }) => {
                    println!("⚠️  Frame {sequence} could not be encoded: {reason}");
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    let snapshot = supervisor.stop().await;
    reporter_cancel.cancel();
    reporter.await?;

    println!("\n📊 Final metrics");
    println!("  Captured:       {}", snapshot.frames_captured);
    println!("  Encoded:        {}", snapshot.frames_encoded);
    println!("  Uploaded:       {}", snapshot.uploads_succeeded);
    println!("  Failed:         {}", snapshot.uploads_failed);
    println!("  Retries:        {}", snapshot.upload_retries);
    println!(
        "  Dropped:        {} (queue) + {} (encoder backlog)",
        snapshot.frames_dropped, snapshot.frames_backlog_dropped
    );
    println!("  Discarded:      {}", snapshot.frames_discarded);
    println!("  Success rate:   {:.1}%", snapshot.success_rate() * 100.0);
    println!("  Upload rate:    {:.2} fps", snapshot.upload_fps());

    Ok(())
}
