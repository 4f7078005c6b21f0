//! Provider manifests
//!
//! A manifest is the JSON document describing a provider: which hosts it serves,
//! which actions it supports and how it is invoked. Field names follow the on-disk
//! manifest format so existing `plugins/*.json` files load unchanged.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Category assigned to manifests that leave it empty
pub const DEFAULT_CATEGORY: &str = "optional";

/// Action name used for downloads
pub const ACTION_DOWNLOAD: &str = "download";

/// How a provider is invoked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Built-in HTTP transfer, the URL is fetched as-is
    Direct,
    /// Script or external binary fed JSON on stdin
    Script,
    /// Command line template with `{{input}}`, `{{url}}` and `{{output}}` placeholders
    Command,
}

/// What a provider is for
///
/// Named functions serialize as plain strings; a custom one as `{"custom": "<name>"}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PluginFunction {
    /// Fetches files
    Download,
    /// Translates content
    Translate,
    /// Provides an emulator
    Emulation,
    /// Anything else, named by the manifest
    Custom(String),
}

/// Script language, selects the interpreter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    /// `python3` (falls back to `python`)
    Python,
    /// `bash`
    Bash,
    /// `node`
    Node,
    /// Compiled, run directly
    Rust,
    /// Compiled, run directly
    Go,
}

impl ScriptLanguage {
    /// Interpreter names to look up on `PATH`, in order of preference
    pub fn interpreters(&self) -> &'static [&'static str] {
        match self {
            ScriptLanguage::Python => &["python3", "python"],
            ScriptLanguage::Bash => &["bash"],
            ScriptLanguage::Node => &["node"],
            ScriptLanguage::Rust | ScriptLanguage::Go => &[],
        }
    }
}

/// Provider manifest
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProviderDescriptor {
    /// Unique provider id
    pub id: String,
    /// Display name
    pub name: String,
    /// Provider version
    #[serde(default)]
    pub version: String,
    /// Host patterns: exact hostnames or `*.` + hostname
    pub supported_hosts: Vec<String>,
    /// Action names, e.g. `download`, `translate`
    #[serde(default)]
    pub supported_actions: Vec<String>,
    /// Invocation style
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Script path plus arguments, or command template
    #[serde(default)]
    pub entry_point: String,
    /// What the provider is for
    #[serde(default = "default_function")]
    pub plugin_function: PluginFunction,
    /// First word of `entry_point` is a binary to look up instead of a script file
    #[serde(default)]
    pub external_binary: bool,
    /// Script language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<ScriptLanguage>,
    /// Shown when the provider's binary is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_instruction: Option<String>,
    /// Grouping for the plugin browser
    #[serde(default)]
    pub category: String,
    /// Where the provider itself can be obtained
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

fn default_function() -> PluginFunction {
    PluginFunction::Download
}

impl ProviderDescriptor {
    /// Parse a manifest, validate it and fill defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let mut descriptor: ProviderDescriptor =
            serde_json::from_str(json).map_err(|e| Error::InvalidManifest {
                reason: e.to_string(),
            })?;
        descriptor.normalize();
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Descriptor for a built-in direct HTTP provider
    pub fn direct(id: impl Into<String>, hosts: Vec<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            supported_hosts: hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .collect(),
            supported_actions: vec![ACTION_DOWNLOAD.to_string()],
            provider_type: ProviderType::Direct,
            entry_point: String::new(),
            plugin_function: PluginFunction::Download,
            external_binary: false,
            language: None,
            install_instruction: None,
            category: "builtin".to_string(),
            download_url: None,
        }
    }

    /// Fill defaults that depend on other fields and lowercase host patterns
    pub fn normalize(&mut self) {
        if self.category.trim().is_empty() {
            self.category = DEFAULT_CATEGORY.to_string();
        }
        self.supported_hosts = self
            .supported_hosts
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
    }

    /// Reject manifests that cannot be registered
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if self.id.contains(['/', '\\']) {
            return Err(invalid(format!("id '{}' must not contain path separators", self.id)));
        }
        if self.name.trim().is_empty() {
            return Err(invalid(format!("provider '{}' has an empty name", self.id)));
        }
        if self.supported_hosts.is_empty() {
            return Err(invalid(format!(
                "provider '{}' declares no supported hosts",
                self.id
            )));
        }
        if let Some(bad) = self
            .supported_hosts
            .iter()
            .find(|h| !super::is_valid_host_pattern(h))
        {
            return Err(invalid(format!(
                "provider '{}' has malformed host pattern '{}'",
                self.id, bad
            )));
        }

        match self.provider_type {
            ProviderType::Direct => {}
            ProviderType::Script | ProviderType::Command => {
                if self.entry_point.trim().is_empty() {
                    return Err(invalid(format!(
                        "provider '{}' needs an entry_point",
                        self.id
                    )));
                }
                if shlex::split(&self.entry_point).is_none_or(|parts| parts.is_empty()) {
                    return Err(invalid(format!(
                        "provider '{}' has an unparseable entry_point",
                        self.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Whether the provider lists `action` in its supported actions
    pub fn supports_action(&self, action: &str) -> bool {
        self.supported_actions
            .iter()
            .any(|a| a.eq_ignore_ascii_case(action))
    }

    /// Whether any host pattern matches `host`
    pub fn serves_host(&self, host: &str) -> bool {
        self.supported_hosts
            .iter()
            .any(|pattern| super::host_matches(pattern, host))
    }

    /// Program token and arguments of `entry_point`
    pub(crate) fn entry_parts(&self) -> Vec<String> {
        shlex::split(&self.entry_point).unwrap_or_default()
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidManifest {
        reason: reason.into(),
    }
}
