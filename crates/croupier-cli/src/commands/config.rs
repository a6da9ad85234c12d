//! `croupier config`: show the effective configuration.

use std::path::Path;

use croupier_types::EffectiveConfig;

pub fn run(config_path: Option<&Path>, sources: bool) -> anyhow::Result<()> {
    let effective = super::load_config(config_path, Vec::new())?;
    if sources {
        for line in source_lines(&effective) {
            println!("{line}");
        }
    } else {
        print!("{}", effective.config.to_toml()?);
    }
    Ok(())
}

/// Files consulted, then `key = source` for every recorded key, sorted.
pub fn source_lines(effective: &EffectiveConfig) -> Vec<String> {
    let mut lines = Vec::new();
    if effective.source_files.is_empty() {
        lines.push("files: (none, built-in defaults only)".to_string());
    } else {
        lines.push("files:".to_string());
        for file in &effective.source_files {
            lines.push(format!("  {}", file.display()));
        }
    }

    let mut keys: Vec<&String> = effective.sources.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(source) = effective.source_of(key) {
            lines.push(format!("{key} = {source}"));
        }
    }
    lines
}
