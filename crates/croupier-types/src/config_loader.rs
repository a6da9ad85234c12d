//! Layered configuration loading with multiple sources merged in priority order.
//!
//! The priority chain (later overrides earlier):
//! 1. Built-in defaults ([`CroupierConfig::default()`])
//! 2. User-level: `~/.croupier/config.toml`
//! 3. Workspace-level: `./croupier.toml`
//! 4. `CROUPIER_*` environment variables (double underscore = nesting)
//! 5. CLI flag overrides supplied by the caller
//!
//! Each key in the final [`EffectiveConfig`] is annotated with the
//! [`ConfigSource`] that determined its value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{CroupierConfig, CONFIG_FILENAME};
use crate::TypesError;

/// Config files larger than this are rejected.
const MAX_CONFIG_FILE_SIZE: u64 = 256 * 1024;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    BuiltinDefault,
    UserFile(PathBuf),
    WorkspaceFile(PathBuf),
    EnvVar(String),
    CliFlag(String),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::BuiltinDefault => write!(f, "built-in default"),
            ConfigSource::UserFile(p) => write!(f, "user file: {}", p.display()),
            ConfigSource::WorkspaceFile(p) => write!(f, "workspace file: {}", p.display()),
            ConfigSource::EnvVar(name) => write!(f, "env var: {name}"),
            ConfigSource::CliFlag(name) => write!(f, "CLI flag: {name}"),
        }
    }
}

/// The merged config plus provenance for each key.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub config: CroupierConfig,
    /// Dot-separated key path -> the source that last set it.
    pub sources: HashMap<String, ConfigSource>,
    /// Config files that were found and loaded, in priority order.
    pub source_files: Vec<PathBuf>,
}

impl EffectiveConfig {
    /// Source of a dot-separated key, falling back to its nearest parent.
    pub fn source_of(&self, key: &str) -> Option<&ConfigSource> {
        let mut path = key;
        loop {
            if let Some(src) = self.sources.get(path) {
                return Some(src);
            }
            match path.rfind('.') {
                Some(idx) => path = &path[..idx],
                None => return None,
            }
        }
    }
}

/// One CLI-supplied override: a dot path and the value to place there.
#[derive(Debug, Clone)]
struct CliOverride {
    flag: String,
    path: Vec<String>,
    value: toml::Value,
}

/// Layered configuration loader.
#[derive(Default)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    workspace_config_path: Option<PathBuf>,
    /// Replaces the process environment (for tests).
    env: Option<HashMap<String, String>>,
    overrides: Vec<CliOverride>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    #[must_use]
    pub fn with_workspace_path(mut self, path: PathBuf) -> Self {
        self.workspace_config_path = Some(path);
        self
    }

    /// Read `CROUPIER_*` variables from `env` instead of the process environment.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Apply a CLI flag on top of every other layer.
    ///
    /// `path` is dot-separated (e.g. `"correlation.timeout_ms"`).
    #[must_use]
    pub fn with_override(mut self, flag: &str, path: &str, value: toml::Value) -> Self {
        self.overrides.push(CliOverride {
            flag: flag.to_string(),
            path: path.split('.').map(str::to_string).collect(),
            value,
        });
        self
    }

    fn user_path(&self) -> PathBuf {
        self.user_config_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(".croupier").join("config.toml")
        })
    }

    fn workspace_path(&self) -> PathBuf {
        self.workspace_config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME))
    }

    fn env_var(&self, name: &str) -> Option<String> {
        match &self.env {
            Some(env) => env.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    /// Load and merge configuration from all sources.
    pub fn load(&self) -> Result<EffectiveConfig, TypesError> {
        let mut sources = HashMap::new();
        let mut source_files = Vec::new();

        let default_config = CroupierConfig::default();
        let mut merged = toml::Value::try_from(&default_config)
            .map_err(|e| TypesError::ConfigError(format!("failed to serialize defaults: {e}")))?;
        if let toml::Value::Table(ref table) = merged {
            for key in table.keys() {
                sources.insert(key.clone(), ConfigSource::BuiltinDefault);
            }
        }

        let user_path = self.user_path();
        if user_path.exists() {
            let layer = parse_layer(&user_path, "user")?;
            deep_merge(&mut merged, &layer);
            record_sources(&layer, &mut sources, &ConfigSource::UserFile(user_path.clone()));
            source_files.push(user_path);
        }

        let workspace_path = self.workspace_path();
        if workspace_path.exists() {
            let layer = parse_layer(&workspace_path, "workspace")?;
            deep_merge(&mut merged, &layer);
            record_sources(
                &layer,
                &mut sources,
                &ConfigSource::WorkspaceFile(workspace_path.clone()),
            );
            source_files.push(workspace_path);
        }

        self.apply_env_overrides(&mut merged, &mut sources)?;

        for o in &self.overrides {
            let path: Vec<&str> = o.path.iter().map(String::as_str).collect();
            set_nested_value(&mut merged, &path, o.value.clone());
            sources.insert(o.path.join("."), ConfigSource::CliFlag(o.flag.clone()));
        }

        let config: CroupierConfig = merged
            .try_into()
            .map_err(|e| TypesError::ConfigError(format!("failed to parse merged config: {e}")))?;
        config.validate()?;

        Ok(EffectiveConfig {
            config,
            sources,
            source_files,
        })
    }

    fn apply_env_overrides(
        &self,
        merged: &mut toml::Value,
        sources: &mut HashMap<String, ConfigSource>,
    ) -> Result<(), TypesError> {
        for mapping in ENV_MAPPINGS {
            let Some(raw) = self.env_var(mapping.env_var) else {
                continue;
            };
            validate_env_value(mapping.env_var, &raw)?;
            let value = env_value_to_toml(mapping, &raw)?;
            set_nested_value(merged, mapping.toml_path, value);
            sources.insert(
                mapping.toml_path.join("."),
                ConfigSource::EnvVar(mapping.env_var.to_string()),
            );
        }
        Ok(())
    }
}

/// Kind of value an environment variable carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKind {
    String,
    Integer,
}

/// Known environment variable mapping.
pub struct EnvMapping {
    pub env_var: &'static str,
    pub toml_path: &'static [&'static str],
    pub kind: EnvKind,
}

/// All supported `CROUPIER_*` environment variables.
pub const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        env_var: "CROUPIER_BROWSER__WS_URL",
        toml_path: &["browser", "ws_url"],
        kind: EnvKind::String,
    },
    EnvMapping {
        env_var: "CROUPIER_BROWSER__HOST",
        toml_path: &["browser", "host"],
        kind: EnvKind::String,
    },
    EnvMapping {
        env_var: "CROUPIER_BROWSER__PORT",
        toml_path: &["browser", "port"],
        kind: EnvKind::Integer,
    },
    EnvMapping {
        env_var: "CROUPIER_BROWSER__FRAME_LOAD_TIMEOUT_MS",
        toml_path: &["browser", "frame_load_timeout_ms"],
        kind: EnvKind::Integer,
    },
    EnvMapping {
        env_var: "CROUPIER_OBSERVER__PATH_MARKER",
        toml_path: &["observer", "path_marker"],
        kind: EnvKind::String,
    },
    EnvMapping {
        env_var: "CROUPIER_CORRELATION__POLL_INTERVAL_MS",
        toml_path: &["correlation", "poll_interval_ms"],
        kind: EnvKind::Integer,
    },
    EnvMapping {
        env_var: "CROUPIER_CORRELATION__TIMEOUT_MS",
        toml_path: &["correlation", "timeout_ms"],
        kind: EnvKind::Integer,
    },
];

fn parse_layer(path: &Path, label: &str) -> Result<toml::Value, TypesError> {
    let content = read_config_file(path)?;
    toml::from_str(&content)
        .map_err(|e| TypesError::ConfigError(format!("invalid {label} config {}: {e}", path.display())))
}

/// Read a config file with a size limit and NUL-byte rejection.
fn read_config_file(path: &Path) -> Result<String, TypesError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        TypesError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(TypesError::ConfigError(format!(
            "config file {} exceeds maximum size of {MAX_CONFIG_FILE_SIZE} bytes (actual: {} bytes)",
            path.display(),
            metadata.len()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        TypesError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;
    if content.contains('\0') {
        return Err(TypesError::ConfigError(format!(
            "config file {} contains null bytes",
            path.display()
        )));
    }
    Ok(content)
}

/// Deep-merge `overlay` into `base`. Tables merge key by key; arrays and
/// scalars are replaced.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn record_sources(layer: &toml::Value, sources: &mut HashMap<String, ConfigSource>, source: &ConfigSource) {
    if let toml::Value::Table(table) = layer {
        for (key, value) in table {
            sources.insert(key.clone(), source.clone());
            record_nested_sources(value, sources, source, key);
        }
    }
}

fn record_nested_sources(
    value: &toml::Value,
    sources: &mut HashMap<String, ConfigSource>,
    source: &ConfigSource,
    prefix: &str,
) {
    if let toml::Value::Table(table) = value {
        for (key, val) in table {
            let path = format!("{prefix}.{key}");
            sources.insert(path.clone(), source.clone());
            record_nested_sources(val, sources, source, &path);
        }
    }
}

fn validate_env_value(var_name: &str, value: &str) -> Result<(), TypesError> {
    if let Some(ch) = value.chars().find(|c| c.is_control()) {
        return Err(TypesError::ConfigError(format!(
            "environment variable {var_name} contains control character U+{:04X}",
            ch as u32
        )));
    }
    Ok(())
}

fn env_value_to_toml(mapping: &EnvMapping, raw: &str) -> Result<toml::Value, TypesError> {
    match mapping.kind {
        EnvKind::String => Ok(toml::Value::String(raw.to_string())),
        EnvKind::Integer => raw.trim().parse::<i64>().map(toml::Value::Integer).map_err(|e| {
            TypesError::ConfigError(format!(
                "environment variable {} must be numeric: {e}",
                mapping.env_var
            ))
        }),
    }
}

/// Set a value at a nested path, creating intermediate tables as needed.
fn set_nested_value(root: &mut toml::Value, path: &[&str], value: toml::Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let toml::Value::Table(table) = root else {
        return;
    };
    if rest.is_empty() {
        table.insert((*first).to_string(), value);
        return;
    }
    let entry = table
        .entry((*first).to_string())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    set_nested_value(entry, rest, value);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
