use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured database path
pub const DATABASE_ENV: &str = "HKTRACKER_DB";

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrackerConfig {
    pub database: Option<String>,
    pub checklist: Option<String>,
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_origins: Vec<String>,
}

impl TrackerConfig {
    /// Config written by `config init`
    pub fn starter() -> Self {
        Self {
            database: Some(default_database_path().to_string_lossy().into_owned()),
            checklist: Some("HK 112% Checklist.md".to_string()),
            port: Some(DEFAULT_PORT),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("hktracker.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("db").join("hk_checklist.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<TrackerConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: TrackerConfig = toml::from_str(&contents)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &TrackerConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Pick the database path: CLI flag, then environment, then config file, then default
pub fn resolve_database(
    flag: Option<PathBuf>,
    env: Option<String>,
    config: Option<&TrackerConfig>,
) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .or_else(|| config.and_then(|c| c.database.as_ref()).map(PathBuf::from))
        .unwrap_or_else(default_database_path)
}

/// `resolve_database` reading the override from the process environment
pub fn database_path(flag: Option<PathBuf>, config: Option<&TrackerConfig>) -> PathBuf {
    resolve_database(flag, std::env::var(DATABASE_ENV).ok(), config)
}

/// Checklist path from the CLI flag or the config file
pub fn checklist_path(flag: Option<PathBuf>, config: Option<&TrackerConfig>) -> Option<PathBuf> {
    flag.or_else(|| config.and_then(|c| c.checklist.as_ref()).map(PathBuf::from))
}

pub fn port(flag: Option<u16>, config: Option<&TrackerConfig>) -> u16 {
    flag.or_else(|| config.and_then(|c| c.port)).unwrap_or(DEFAULT_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hktracker.toml");
        let config = TrackerConfig::starter();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config() {
        let config: TrackerConfig = toml::from_str("port = 9000\n").unwrap();
        assert_eq!(config.port, Some(9000));
        assert!(config.allowed_origins.is_empty());
        assert_eq!(port(None, Some(&config)), 9000);
        assert_eq!(port(Some(1234), Some(&config)), 1234);
        assert_eq!(port(None, None), DEFAULT_PORT);
    }

    #[test]
    fn test_database_precedence() {
        let config = TrackerConfig { database: Some("from-config.db".into()), ..Default::default() };

        assert_eq!(
            resolve_database(Some("flag.db".into()), Some("env.db".into()), Some(&config)),
            PathBuf::from("flag.db")
        );
        assert_eq!(
            resolve_database(None, Some("env.db".into()), Some(&config)),
            PathBuf::from("env.db")
        );
        assert_eq!(
            resolve_database(None, Some(String::new()), Some(&config)),
            PathBuf::from("from-config.db")
        );
        assert_eq!(resolve_database(None, None, None), default_database_path());
    }

    #[test]
    fn test_checklist_path() {
        let config = TrackerConfig { checklist: Some("list.md".into()), ..Default::default() };
        assert_eq!(checklist_path(None, Some(&config)), Some(PathBuf::from("list.md")));
        assert_eq!(checklist_path(Some("other.md".into()), Some(&config)), Some(PathBuf::from("other.md")));
        assert_eq!(checklist_path(None, None), None);
    }
}
