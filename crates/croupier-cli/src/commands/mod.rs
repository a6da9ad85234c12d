//! CLI command implementations for the `croupier` binary.

pub mod config;
pub mod profiles;
pub mod run;

use std::path::Path;

use anyhow::Context;

use croupier_types::{ConfigLoader, EffectiveConfig};

/// Load the layered configuration, with `extra` applied as CLI overrides.
///
/// Each override is `(flag, dot.path, value)`.
pub fn load_config(
    config_path: Option<&Path>,
    extra: Vec<(&str, &str, toml::Value)>,
) -> anyhow::Result<EffectiveConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path {
        anyhow::ensure!(path.exists(), "config file not found: {}", path.display());
        loader = loader.with_workspace_path(path.to_path_buf());
    }
    for (flag, key, value) in extra {
        loader = loader.with_override(flag, key, value);
    }
    loader.load().context("failed to load configuration")
}
