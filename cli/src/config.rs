use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nutrilog_core::sync::SyncConfig;

const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Optional `config.toml` in the data directory. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    remote_url: Option<String>,
    api_key: Option<String>,
    debounce_ms: Option<u64>,
    status_reset_ms: Option<u64>,
    gemini_model: Option<String>,
}

pub struct Config {
    pub db_path: PathBuf,
    pub server_db_path: PathBuf,
    pub data_dir: PathBuf,
    /// Base URL of the sync server; sync is off when unset.
    pub remote_url: Option<String>,
    /// Bearer key sent to the sync server.
    pub api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub sync: SyncConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nutrilog").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Self::from_dir(&data_dir, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_dir(data_dir: &Path, vars: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file_path = data_dir.join("config.toml");
        let file = if file_path.exists() {
            let raw = std::fs::read_to_string(&file_path)
                .with_context(|| format!("Failed to read {}", file_path.display()))?;
            toml::from_str::<FileConfig>(&raw)
                .with_context(|| format!("Invalid config file: {}", file_path.display()))?
        } else {
            FileConfig::default()
        };

        let env = |key: &str| vars(key).filter(|v| !v.trim().is_empty());
        let defaults = SyncConfig::default();

        let config = Config {
            db_path: data_dir.join("nutrilog.db"),
            server_db_path: data_dir.join("server.db"),
            data_dir: data_dir.to_path_buf(),
            remote_url: env("NUTRILOG_REMOTE_URL")
                .or(file.remote_url)
                .map(|u| u.trim_end_matches('/').to_string()),
            api_key: env("NUTRILOG_API_KEY").or(file.api_key),
            gemini_api_key: env("GEMINI_API_KEY"),
            gemini_model: file
                .gemini_model
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            sync: SyncConfig {
                debounce: file
                    .debounce_ms
                    .map_or(defaults.debounce, Duration::from_millis),
                status_reset: file
                    .status_reset_ms
                    .map_or(defaults.status_reset, Duration::from_millis),
            },
        };
        log::debug!(
            "Data directory {}, remote sync {}",
            config.data_dir.display(),
            config.remote_url.as_deref().unwrap_or("off")
        );
        Ok(config)
    }

    /// Load the server's API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)`; `newly_created` is true on first run.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Set NUTRILOG_API_KEY={key} on each client to connect.");
        Ok((key, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_dir(dir.path(), no_env).unwrap();
        assert_eq!(config.db_path, dir.path().join("nutrilog.db"));
        assert!(config.remote_url.is_none());
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_file_values_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "remote_url = \"http://file.example:8080/\"\napi_key = \"from-file\"\ndebounce_ms = 500\n",
        )
        .unwrap();

        let config = Config::from_dir(dir.path(), no_env).unwrap();
        assert_eq!(config.remote_url.as_deref(), Some("http://file.example:8080"));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.sync.debounce, Duration::from_millis(500));
        assert_eq!(config.sync.status_reset, SyncConfig::default().status_reset);

        let config = Config::from_dir(dir.path(), |key| match key {
            "NUTRILOG_REMOTE_URL" => Some("http://env.example".to_string()),
            "NUTRILOG_API_KEY" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.remote_url.as_deref(), Some("http://env.example"));
        // Blank env values do not override the file.
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "remote = \"x\"\n").unwrap();
        assert!(Config::from_dir(dir.path(), no_env).is_err());
    }

    #[test]
    fn test_api_key_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_dir(dir.path(), no_env).unwrap();
        let (key, created) = config.load_or_create_api_key().unwrap();
        assert!(created);
        assert_eq!(key.len(), 64);
        let (again, created) = config.load_or_create_api_key().unwrap();
        assert!(!created);
        assert_eq!(again, key);
    }
}
