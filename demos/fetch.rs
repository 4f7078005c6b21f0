//! Fetch example
//!
//! Downloads a URL through the provider registry, prints progress as it
//! arrives and unpacks the result when it is an archive.
//!
//! ```text
//! cargo run --example fetch -- https://example.com/game.zip
//! ```

use arcade_dl::config::{Config, DownloadConfig, PersistenceConfig};
use arcade_dl::extraction::is_archive;
use arcade_dl::{Downloader, Event};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let url = std::env::args().nth(1).ok_or("usage: fetch <url>")?;

    let config = Config {
        download: DownloadConfig {
            download_dir: "downloads".into(),
            temp_dir: "temp".into(),
            ..Default::default()
        },
        persistence: PersistenceConfig {
            database_path: "arcade-dl.db".into(),
        },
        ..Default::default()
    };

    let archive_extensions = config.extraction.archive_extensions.clone();
    let downloader = Downloader::new(config).await?;
    for plugin in downloader.get_all_plugins() {
        println!("provider {} serves {:?}", plugin.id, plugin.supported_hosts);
    }

    let id = downloader.start(&url, None, None).await?;
    let mut events = downloader.subscribe_job(&id);
    println!("started job {}", id);

    let mut downloaded = None;
    while let Some(event) = events.recv().await {
        match event {
            Event::DownloadProgress {
                progress: Some(percent),
                ..
            } => println!("  {:.1}%", percent),
            Event::DownloadProgress {
                downloaded_bytes, ..
            } => println!("  {} bytes", downloaded_bytes),
            Event::DownloadComplete { filename, path, .. } => {
                println!("done: {} -> {}", filename, path.display());
                downloaded = Some(path);
                break;
            }
            Event::DownloadError { error, .. } => {
                eprintln!("failed: {}", error);
                break;
            }
            Event::DownloadCancelled { .. } => break,
            _ => {}
        }
    }

    if let Some(archive) = downloaded.filter(|path| is_archive(path, &archive_extensions)) {
        let output = archive.with_extension("");
        downloader.extract(&id, &archive, &output).await?;

        while let Some(event) = events.recv().await {
            match event {
                Event::ExtractionProgress {
                    progress: Some(percent),
                    ..
                } => println!("  unpacking {:.0}%", percent),
                Event::ExtractionComplete { output_dir, .. } => {
                    println!("extracted to {}", output_dir.display());
                    break;
                }
                Event::ExtractionFailed { error, .. } => {
                    eprintln!("extraction failed: {}", error);
                    break;
                }
                _ => {}
            }
        }
    }

    downloader.shutdown().await?;
    Ok(())
}
