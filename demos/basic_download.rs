//! Basic download example
//!
//! This example demonstrates the core functionality of media-dl:
//! - Creating a downloader instance
//! - Probing a URL before queueing it
//! - Subscribing to events
//! - Queueing a video and an audio job
//! - Shutting down cleanly on Ctrl+C
//!
//! Usage: `cargo run --example basic_download -- <url> [output-dir]`

use media_dl::{
    Config, ContainerFormat, Event, JobSpec, MediaDownloader, Status, run_with_shutdown,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .ok_or("usage: basic_download <url> [output-dir]")?;
    let output_dir = args.next().unwrap_or_else(|| "downloads".to_string());
    let output_dir = std::path::absolute(output_dir)?;

    // Finished jobs start the next one after the settle delay
    let config = Config::default();
    let downloader = MediaDownloader::new(config)?;

    let info = downloader.probe_media(&url, None).await?;
    println!(
        "Found: {} ({})",
        info.title.as_deref().unwrap_or("untitled"),
        info.duration_text().as_deref().unwrap_or("unknown length")
    );

    // Subscribe to events
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Queued { id, url } => {
                    println!("✓ Queued job #{}: {}", id, url);
                }
                Event::ProgressChanged { id, percent } => {
                    println!("⬇ Job #{}: {:.1}%", id, percent);
                }
                Event::DestinationKnown { id, path } => {
                    println!("📁 Job #{} writing to {}", id, path);
                }
                Event::StatusChanged {
                    id,
                    status: Status::Failed,
                    error,
                } => {
                    println!("✗ Job #{} failed: {}", id, error.unwrap_or_default());
                }
                Event::StatusChanged { id, status, .. } => {
                    println!("• Job #{} is now {}", id, status);
                }
                Event::StartFailed { id, error } => {
                    println!("✗ Job #{} could not start: {}", id, error);
                }
                Event::Shutdown => break,
                _ => {}
            }
        }
    });

    downloader
        .enqueue(JobSpec::new(&url, &output_dir).with_quality("720"))
        .await?;
    downloader
        .enqueue(JobSpec::new(&url, &output_dir).audio(ContainerFormat::Mp3))
        .await?;
    downloader.start_next().await?;

    // Runs until SIGINT/SIGTERM, then stops the active job
    run_with_shutdown(downloader).await?;

    Ok(())
}
