use civic_lifecycle::{DEFAULT_CLEANUP_DAYS, DEFAULT_ESCALATION_KEYWORDS};
use civic_routing::AiConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH: &str = ".civic/config.json";
pub const DEFAULT_DATA_DIR: &str = "data";

/// `.civic/config.json`; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CivicConfig {
    pub data_dir: Option<PathBuf>,
    pub ai: AiConfig,
    pub cleanup_days: Option<u32>,
    pub escalation_keywords: Option<Vec<String>>,
}

/// Configuration after file, environment and flag overrides are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub ai: AiConfig,
    pub cleanup_days: u32,
    pub escalation_keywords: Vec<String>,
}

pub fn load_config(root: &Path) -> Option<CivicConfig> {
    let path = root.join(CONFIG_PATH);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<CivicConfig>(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            eprintln!("Warning: failed to parse {}: {}", path.display(), err);
            None
        }
    }
}

/// Precedence for the data directory: flag, `CIVIC_DATA_DIR`, `dataDir`,
/// then `<root>/data`. Relative paths resolve against `root`.
pub fn resolve_settings(
    root: &Path,
    config: Option<CivicConfig>,
    data_dir_flag: Option<&Path>,
    offline_flag: bool,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let config = config.unwrap_or_default();

    let data_dir = data_dir_flag
        .map(Path::to_path_buf)
        .or_else(|| {
            env("CIVIC_DATA_DIR")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        })
        .or(config.data_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let data_dir = if data_dir.is_absolute() {
        data_dir
    } else {
        root.join(data_dir)
    };

    let mut ai = config.ai;
    if offline_flag || env("CIVIC_AI_DISABLED").is_some_and(|value| is_truthy(&value)) {
        ai.enabled = false;
    }

    let escalation_keywords = config
        .escalation_keywords
        .filter(|keywords| !keywords.is_empty())
        .unwrap_or_else(|| {
            DEFAULT_ESCALATION_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect()
        });

    Settings {
        root: root.to_path_buf(),
        data_dir,
        ai,
        cleanup_days: config.cleanup_days.unwrap_or(DEFAULT_CLEANUP_DAYS),
        escalation_keywords,
    }
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
