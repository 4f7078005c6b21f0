//! Common test utilities for arcade-dl integration tests

use arcade_dl::config::Config;
use arcade_dl::{Event, Subscription};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Config with every path under `root` and loopback served by the direct provider
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.temp_dir = root.join("temp");
    config.persistence.database_path = root.join("arcade-dl.db");
    config.plugins.plugins_dir = None;
    config.plugins.direct_hosts = vec!["127.0.0.1".to_string()];
    config
}

/// Collect events until the first terminal one
pub async fn collect_until_terminal(events: &mut Subscription) -> Vec<Event> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for events")
            .expect("bus closed");
        let terminal = event.is_terminal();
        seen.push(event);
        if terminal {
            return seen;
        }
    }
}

/// In-memory zip with the given entries
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
