use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".weavescope";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of project builds running at once.
    pub workers: usize,
    pub debounce_ms: u64,
    pub source_extensions: Vec<String>,
    pub config_extensions: Vec<String>,
    /// Emit "advises"/"advised by" markers next to problem markers.
    pub create_reference_markers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            debounce_ms: 500,
            source_extensions: vec!["java".to_string()],
            config_extensions: vec!["xml".to_string()],
            create_reference_markers: true,
        }
    }
}

impl EngineConfig {
    /// Defaults, then `<root>/.weavescope/config.json` if present, then
    /// environment overrides.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = Self::file_path(project_root);
        let mut config = if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            let config: EngineConfig = serde_json::from_str(&content)?;
            tracing::debug!("Loaded configuration from {}", path.display());
            config
        } else {
            EngineConfig::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn file_path(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var("WEAVESCOPE_WORKERS") {
            match raw.parse::<usize>() {
                Ok(n) => self.workers = n,
                Err(_) => tracing::warn!("Ignoring invalid WEAVESCOPE_WORKERS value '{}'", raw),
            }
        }
        self.workers = self.workers.max(1);
    }

    pub fn is_source(&self, path: &Path) -> bool {
        has_extension(path, &self.source_extensions)
    }

    pub fn is_config(&self, path: &Path) -> bool {
        has_extension(path, &self.config_extensions)
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        self.is_source(path) || self.is_config(path)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x == e))
}
