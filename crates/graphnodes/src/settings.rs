//! Process configuration: defaults, then an optional TOML file, then `GRAPHFLOW_*` env vars.

use graphruntime::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Resources the built-in executors reach out to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Root that file and database access is confined to
    pub storage_path: PathBuf,
    pub database_file: String,
    pub model_api_url: String,
    pub model_api_key: String,
    pub http_timeout_seconds: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./storage"),
            database_file: "workflow.db".to_string(),
            model_api_url: "http://localhost:3000".to_string(),
            model_api_key: String::new(),
            http_timeout_seconds: 30,
        }
    }
}

impl ExecutorSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub executors: ExecutorSettings,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Settings {
    /// Load settings, reading `path` when given and applying environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.normalize();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `GRAPHFLOW_*` overrides looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        parse_override(
            &lookup,
            "GRAPHFLOW_MAX_CONCURRENT_EXECUTIONS",
            &mut self.engine.max_concurrent_executions,
        );
        parse_override(
            &lookup,
            "GRAPHFLOW_EXECUTION_TIMEOUT_SECONDS",
            &mut self.engine.execution_timeout_seconds,
        );
        if let Some(path) = lookup("GRAPHFLOW_STORAGE_PATH") {
            self.executors.storage_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("GRAPHFLOW_MODEL_API_URL") {
            self.executors.model_api_url = url;
        }
        if let Some(key) = lookup("GRAPHFLOW_MODEL_API_KEY") {
            self.executors.model_api_key = key;
        }
    }

    fn normalize(&mut self) {
        if self.engine.max_concurrent_executions == 0 {
            tracing::warn!("max_concurrent_executions must be at least 1, using 1");
            self.engine.max_concurrent_executions = 1;
        }
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.engine.max_concurrent_executions, 10);
        assert_eq!(settings.engine.execution_timeout_seconds, 300);
        assert_eq!(settings.executors.storage_path, PathBuf::from("./storage"));
        assert_eq!(settings.executors.database_file, "workflow.db");
        assert_eq!(settings.executors.model_api_url, "http://localhost:3000");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [engine]
            max_concurrent_executions = 4

            [executors]
            storage_path = "/tmp/flows"
            "#,
        )
        .unwrap();

        assert_eq!(settings.engine.max_concurrent_executions, 4);
        assert_eq!(settings.engine.execution_timeout_seconds, 300);
        assert_eq!(settings.executors.storage_path, PathBuf::from("/tmp/flows"));
        assert_eq!(settings.executors.http_timeout_seconds, 30);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[
            ("GRAPHFLOW_MAX_CONCURRENT_EXECUTIONS", "3"),
            ("GRAPHFLOW_MODEL_API_URL", "http://models:9000"),
            ("GRAPHFLOW_STORAGE_PATH", "/data"),
        ]));

        assert_eq!(settings.engine.max_concurrent_executions, 3);
        assert_eq!(settings.executors.model_api_url, "http://models:9000");
        assert_eq!(settings.executors.storage_path, PathBuf::from("/data"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = Settings::default();
        settings.apply_env(env(&[("GRAPHFLOW_EXECUTION_TIMEOUT_SECONDS", "soon")]));
        assert_eq!(settings.engine.execution_timeout_seconds, 300);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let mut settings = Settings::default();
        settings.engine.max_concurrent_executions = 0;
        settings.normalize();
        assert_eq!(settings.engine.max_concurrent_executions, 1);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executors]\ndatabase_file = \"other.db\"").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.executors.database_file, "other.db");
    }

    #[test]
    fn load_rejects_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nmax_concurrent_executions = ").unwrap();
        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(SettingsError::Parse { .. })
        ));

        let missing = Path::new("/definitely/not/here.toml");
        assert!(matches!(
            Settings::load(Some(missing)),
            Err(SettingsError::Read { .. })
        ));
    }
}
