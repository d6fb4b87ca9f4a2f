use anyhow::{Context, Result};
use md2_parse::{HtmlOptions, HwpIds, HwpOptions, LatexOptions};
use serde::Deserialize;
use std::path::Path;

/// Looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "md2.json";

/// Top-level md2.json schema. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Md2Config {
    pub html: HtmlOptions,
    pub latex: LatexOptions,
    pub hwp: HwpOptions,
    /// First object ids handed to the HWP backend.
    pub hwp_ids: HwpIds,
}

/// Load an explicit config file, or `md2.json` from `dir` if present.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<Md2Config> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => dir.join(CONFIG_FILE),
    };

    if explicit.is_none() && !config_path.exists() {
        return Ok(Md2Config::default());
    }

    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let config: Md2Config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;
    Ok(config)
}
