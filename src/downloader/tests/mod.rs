use super::test_helpers::*;
use super::*;
use crate::error::JobError;
use crate::types::{Event, JobStatus};


/// Start a quick 3-chunk download on the test provider and wait for it to finish
async fn completed_download(downloader: &Downloader, filename: &str) -> JobId {
    register_test_provider(downloader, "chunks", Arc::new(ChunkedProvider::new(3, 4096)));

    let mut events = downloader.subscribe();
    let id = downloader
        .start(
            &format!("https://cdn.files.test/{}", filename),
            None,
            None,
        )
        .await
        .unwrap();

    let seen = collect_until_terminal(&mut events).await;
    assert!(
        matches!(seen.last(), Some(Event::DownloadComplete { .. })),
        "unexpected events: {:?}",
        seen
    );
    wait_for_idle(downloader).await;
    id
}

fn progress_values(events: &[Event]) -> Vec<Option<f32>> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::DownloadProgress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect()
}
