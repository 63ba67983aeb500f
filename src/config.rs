//! Workflow configuration.
//!
//! The config file is JSON. Every field except `schema_version` has a default,
//! so an empty object with a schema version is a valid config. CLI flags are
//! layered on top in `main`.
use crate::roles::{RoleCatalog, RoleProfile};
use crate::workflow::Variant;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Environment variable consulted for the LM command when neither the CLI nor
/// the config file names one.
pub const LM_COMMAND_ENV: &str = "RANSWER_LM_COMMAND";

pub const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    pub schema_version: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub lm: LmSettings,
    /// Replaces the built-in role catalog when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RoleProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmBackend {
    #[default]
    Command,
    Openai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LmSettings {
    #[serde(default)]
    pub backend: LmBackend,
    /// Command line for the `command` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            backend: LmBackend::default(),
            command: None,
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Config used when no file is present.
pub fn default_config() -> WorkflowConfig {
    WorkflowConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        max_retries: DEFAULT_MAX_RETRIES,
        variant: Variant::default(),
        lm: LmSettings::default(),
        roles: Vec::new(),
    }
}

/// Default config with the built-in roles spelled out, for `init`.
pub fn config_stub() -> Result<String> {
    let config = WorkflowConfig {
        roles: RoleCatalog::builtin().all_roles().to_vec(),
        ..default_config()
    };
    serde_json::to_string_pretty(&config).context("serialize config stub")
}

/// `$XDG_CONFIG_HOME/role-answer/config.json` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("role-answer").join("config.json"))
}

pub fn load_config(path: &Path) -> Result<WorkflowConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: WorkflowConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Load an explicit config, else the default location if present, else the
/// built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<WorkflowConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path().filter(|path| path.is_file()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading default config");
            load_config(&path)
        }
        None => Ok(default_config()),
    }
}

pub fn write_config(path: &Path, contents: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("create config dir")?;
    }
    fs::write(path, contents.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &WorkflowConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.lm.timeout_seconds == 0 {
        return Err(anyhow!("lm.timeout_seconds must be positive"));
    }
    if config.lm.backend == LmBackend::Openai && config.lm.model.trim().is_empty() {
        return Err(anyhow!("lm.model must be non-empty for the openai backend"));
    }
    if !config.roles.is_empty() {
        RoleCatalog::new(config.roles.clone()).context("invalid roles")?;
    }
    Ok(())
}

/// Role catalog named by the config, or the built-in one.
pub fn catalog(config: &WorkflowConfig) -> Result<RoleCatalog> {
    if config.roles.is_empty() {
        return Ok(RoleCatalog::builtin());
    }
    RoleCatalog::new(config.roles.clone()).context("invalid roles")
}

/// LM command in priority order: CLI flag, config file, environment.
///
/// A blank value at any level counts as unset and defers to the next one.
pub fn resolve_lm_command(
    cli: Option<&str>,
    settings: &LmSettings,
    env_value: Option<String>,
) -> Option<String> {
    let present = |command: &String| !command.trim().is_empty();
    cli.map(str::to_string)
        .filter(present)
        .or_else(|| settings.command.clone().filter(present))
        .or_else(|| env_value.filter(present))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
