//! Loading manifests from a plugins directory

use super::PluginRegistry;
use super::descriptor::ProviderDescriptor;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::Path;
use utoipa::ToSchema;

/// Outcome of [`PluginRegistry::load_dir`]
#[derive(Clone, Debug, Default, Serialize, ToSchema)]
pub struct LoadReport {
    /// Ids of the providers that were registered
    pub loaded: Vec<String>,
    /// One message per manifest that was skipped
    pub errors: Vec<String>,
}

impl PluginRegistry {
    /// Register every `*.json` manifest in `dir`
    ///
    /// Manifests are visited in file-name order. A bad manifest is reported and
    /// skipped; only an unreadable directory fails the whole call.
    pub fn load_dir(&self, dir: &Path) -> Result<LoadReport> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read plugins directory {}: {}", dir.display(), e),
            ))
        })?;

        let mut report = LoadReport::default();
        let mut manifests = Vec::new();

        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                        manifests.push(path);
                    }
                }
                Err(e) => report
                    .errors
                    .push(format!("Failed to read directory entry: {}", e)),
            }
        }
        manifests.sort();

        for path in manifests {
            let outcome = std::fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read plugin file {}: {}", path.display(), e))
                .and_then(|content| {
                    ProviderDescriptor::from_json(&content).map_err(|e| {
                        format!("Failed to parse plugin manifest {}: {}", path.display(), e)
                    })
                })
                .and_then(|descriptor| {
                    let id = descriptor.id.clone();
                    self.register_in(descriptor, Some(dir))
                        .map(|()| id)
                        .map_err(|e| format!("{}: {}", path.display(), e))
                });

            match outcome {
                Ok(id) => report.loaded.push(id),
                Err(message) => {
                    tracing::warn!(error = %message, "plugin manifest skipped");
                    report.errors.push(message);
                }
            }
        }

        Ok(report)
    }
}
