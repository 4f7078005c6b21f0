//! Out-of-process providers: scripts and command templates
//!
//! Both kinds answer with a single JSON object on stdout:
//! `{"path": "..."}` for a file they wrote themselves, `{"url": "...", "filename": "..."}`
//! for a direct link the core should fetch, or `{"error": "..."}`. Terminal escape
//! sequences are stripped before parsing.

use super::descriptor::{ACTION_DOWNLOAD, ProviderDescriptor};
use super::provider::{FetchOutcome, FetchRequest, Provider};
use crate::error::{Error, Result, TransferError};
use crate::utils::strip_ansi_codes;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PluginOutput {
    File {
        path: PathBuf,
    },
    Link {
        url: String,
        #[serde(default)]
        filename: Option<String>,
    },
    Failure {
        error: String,
    },
}

/// Runs a script (through its interpreter) or an external binary, JSON in on stdin
#[derive(Clone, Debug)]
pub struct ScriptProvider {
    id: String,
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ScriptProvider {
    /// Resolve the program to run for a script manifest
    ///
    /// Fails with `InvalidManifest` when the script file, interpreter or external
    /// binary cannot be found; the manifest's install instruction is appended.
    pub fn from_descriptor(
        descriptor: &ProviderDescriptor,
        plugins_dir: Option<&Path>,
        search_path: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let parts = descriptor.entry_parts();
        let Some((first, rest)) = parts.split_first() else {
            return Err(missing(descriptor, "empty entry_point".to_string()));
        };

        let (program, args) = if descriptor.external_binary {
            let binary = locate_binary(first, search_path).ok_or_else(|| {
                missing(
                    descriptor,
                    format!("external binary '{}' not found", first),
                )
            })?;
            (binary, rest.to_vec())
        } else {
            let script = match plugins_dir {
                Some(dir) => dir.join(first),
                None => PathBuf::from(first),
            };
            if !script.is_file() {
                return Err(missing(
                    descriptor,
                    format!("script file {} not found", script.display()),
                ));
            }

            let interpreters = descriptor
                .language
                .map(|lang| lang.interpreters())
                .unwrap_or_default();

            if interpreters.is_empty() {
                (script, rest.to_vec())
            } else {
                let interpreter = interpreters
                    .iter()
                    .find_map(|name| locate_binary(name, search_path))
                    .ok_or_else(|| {
                        missing(
                            descriptor,
                            format!("interpreter '{}' not found", interpreters.join("' or '")),
                        )
                    })?;
                let mut args = vec![script.to_string_lossy().into_owned()];
                args.extend(rest.iter().cloned());
                (interpreter, args)
            }
        };

        tracing::debug!(
            provider = %descriptor.id,
            program = %program.display(),
            ?args,
            "script provider resolved"
        );

        Ok(Self {
            id: descriptor.id.clone(),
            program,
            args,
            timeout,
        })
    }
}

#[async_trait]
impl Provider for ScriptProvider {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let input = plugin_input(request);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            Error::Plugin(format!(
                "failed to start provider '{}' ({}): {}",
                self.id,
                self.program.display(),
                e
            ))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&input)?;
            // A script that ignores its input may exit before reading it
            if let Err(e) = stdin.write_all(&payload).await
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(Error::Plugin(format!(
                    "failed to write to provider '{}': {}",
                    self.id, e
                )));
            }
        }

        let output = wait_bounded(&self.id, child.wait_with_output(), request, self.timeout).await?;
        interpret_output(&self.id, output, &request.output_dir)
    }
}

/// Runs a command line built from a template
///
/// `{{input}}` becomes the JSON input, `{{url}}` the URL and `{{output}}` the scratch
/// directory. Placeholders are substituted per argument after shell-style splitting,
/// so values containing spaces or quotes stay a single argument.
#[derive(Clone, Debug)]
pub struct CommandProvider {
    id: String,
    template: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    /// Build from a command manifest
    pub fn from_descriptor(descriptor: &ProviderDescriptor, timeout: Duration) -> Result<Self> {
        let template = descriptor.entry_parts();
        if template.is_empty() {
            return Err(Error::InvalidManifest {
                reason: format!("provider '{}' has an empty command", descriptor.id),
            });
        }

        Ok(Self {
            id: descriptor.id.clone(),
            template,
            timeout,
        })
    }

    fn render(&self, request: &FetchRequest) -> Result<Vec<String>> {
        let input = serde_json::to_string(&plugin_input(request))?;
        let output_dir = request.output_dir.to_string_lossy();

        Ok(self
            .template
            .iter()
            .map(|part| {
                part.replace("{{input}}", &input)
                    .replace("{{url}}", &request.url)
                    .replace("{{output}}", &output_dir)
            })
            .collect())
    }
}

#[async_trait]
impl Provider for CommandProvider {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        let argv = self.render(request)?;
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Plugin(format!("provider '{}' has an empty command", self.id)));
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Plugin(format!(
                    "failed to execute provider '{}' command '{}': {}",
                    self.id, program, e
                ))
            })?;

        let output = wait_bounded(&self.id, child.wait_with_output(), request, self.timeout).await?;
        interpret_output(&self.id, output, &request.output_dir)
    }
}

fn plugin_input(request: &FetchRequest) -> serde_json::Value {
    let action = if request.action.is_empty() {
        ACTION_DOWNLOAD
    } else {
        request.action.as_str()
    };

    serde_json::json!({
        "action": action,
        "url": request.url,
        "output": request.output_dir,
    })
}

/// Wait for the child, giving up on cancellation or timeout
///
/// The child is spawned with `kill_on_drop`, so abandoning the future kills it.
async fn wait_bounded<F>(
    provider: &str,
    wait: F,
    request: &FetchRequest,
    timeout: Duration,
) -> Result<Output>
where
    F: std::future::Future<Output = std::io::Result<Output>>,
{
    tokio::select! {
        _ = request.cancel.cancelled() => {
            tracing::debug!(provider, job_id = %request.job_id, "provider process killed on cancel");
            Err(Error::Transfer(TransferError::Interrupted {
                reason: "cancelled".to_string(),
            }))
        }
        result = tokio::time::timeout(timeout, wait) => match result {
            Ok(output) => output.map_err(|e| {
                Error::Plugin(format!("provider '{}' execution failed: {}", provider, e))
            }),
            Err(_) => Err(Error::Plugin(format!(
                "provider '{}' timed out after {}s",
                provider,
                timeout.as_secs()
            ))),
        },
    }
}

fn interpret_output(provider: &str, output: Output, output_dir: &Path) -> Result<FetchOutcome> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        tracing::debug!(provider, stderr = %stderr.trim(), "provider stderr");
    }

    if !output.status.success() {
        let detail = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no error output");
        return Err(Error::Transfer(TransferError::Provider {
            provider: provider.to_string(),
            reason: format!("exited with {}: {}", output.status, strip_ansi_codes(detail)),
        }));
    }

    let stdout = strip_ansi_codes(&String::from_utf8_lossy(&output.stdout));
    let parsed = serde_json::from_str::<PluginOutput>(stdout.trim()).or_else(|e| {
        // Chatty scripts print logs first; take the last line that parses
        stdout
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str::<PluginOutput>(line.trim()).ok())
            .ok_or_else(|| {
                Error::Plugin(format!(
                    "invalid output from provider '{}': {} - raw output: {}",
                    provider,
                    e,
                    stdout.trim()
                ))
            })
    })?;

    match parsed {
        PluginOutput::File { path } => {
            let path = if path.is_relative() {
                output_dir.join(path)
            } else {
                path
            };
            Ok(FetchOutcome::File(path))
        }
        PluginOutput::Link { url, filename } => Ok(FetchOutcome::Redirect { url, filename }),
        PluginOutput::Failure { error } => Err(Error::Transfer(TransferError::Provider {
            provider: provider.to_string(),
            reason: error,
        })),
    }
}

fn locate_binary(name: &str, search_path: bool) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.components().count() > 1 || direct.is_absolute() {
        return direct.is_file().then(|| direct.to_path_buf());
    }
    if search_path {
        which::which(name).ok()
    } else {
        None
    }
}

fn missing(descriptor: &ProviderDescriptor, what: String) -> Error {
    let mut reason = format!("{} for provider '{}'", what, descriptor.id);
    if let Some(instruction) = &descriptor.install_instruction {
        reason.push_str(&format!("; installation instruction: {}", instruction));
    }
    Error::InvalidManifest { reason }
}
