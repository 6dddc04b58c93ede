//! Configuration loading from nilprobe.toml.

use std::path::{Path, PathBuf};

use nilprobe_engine::NilOptions;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "nilprobe.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Evaluator limits.
    pub analysis: NilOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Drop traces whose located steps repeat an earlier trace.
    pub dedupe: bool,
    /// Maximum number of traces reported. 0 = unlimited.
    pub max_traces: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Find and load nilprobe.toml, walking up from `start_dir`.
/// Returns the default config if no file is found.
pub fn load_config(start_dir: &Path) -> Result<Config, ConfigError> {
    match find_config_file(start_dir) {
        Some(path) => load_config_file(&path),
        None => Ok(Config::default()),
    }
}

pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Walk up directories looking for nilprobe.toml.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Default TOML content for `nilprobe init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"[analysis]
# Calls nested deeper than this below an analyzed function are not followed.
max_call_depth = 64
# Stop following a call once the same callee, with arguments that may be
# nil in the same way, is already this many times on the call chain.
max_reentry = 2
# Blocks one function evaluation may visit.
max_block_visits = 4096
# Calls followed while analyzing one function.
max_frames = 10000
memoize = true

[output]
format = "text"   # text | json | sarif
dedupe = false
max_traces = 0    # 0 = unlimited
"#;
