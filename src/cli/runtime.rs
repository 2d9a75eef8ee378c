use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
    /// False when no file existed and defaults are in effect.
    pub found: bool,
}

/// `--config`, else `./config/config.yaml`, else
/// `<config dir>/formflow/config.yaml`, else defaults.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path(),
    };

    if !config_path.exists() {
        return Ok(LoadedConfig {
            config: Config::default(),
            path: config_path,
            found: false,
        });
    }

    let content = fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
    let config = parse_config(&content, &config_path)?;
    Ok(LoadedConfig {
        config,
        path: config_path,
        found: true,
    })
}

fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("config/config.yaml");
    if local_config.exists() {
        return local_config;
    }
    match dirs::config_dir() {
        Some(mut path) => {
            path.push("formflow");
            path.push("config.yaml");
            path
        }
        None => local_config,
    }
}

fn parse_config(content: &str, path: &Path) -> Result<Config> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formflow.yaml");
        std::fs::write(&path, "logging:\n  level: debug\nbrowser:\n  headless: true\n").unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert!(loaded.found);
        assert_eq!(loaded.path, path);
        assert!(loaded.config.browser.headless);
        assert_eq!(loaded.config.logging.level.as_deref(), Some("debug"));
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let loaded = load_config(Some(&path)).await.unwrap();
        assert!(!loaded.found);
        assert!(!loaded.config.browser.headless);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "browser: [not, a, map]\n").unwrap();

        let err = load_config(Some(&path)).await.err().unwrap();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
