//! Configuration file management for fitplan.
//!
//! Provides a TOML-based config file at `~/.config/fitplan/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use fitplan_core::media::image::{DEFAULT_PRIMARY_MODEL, DEFAULT_SECONDARY_MODEL};
use fitplan_core::orchestrator::{DEFAULT_DEADLINE, DEFAULT_PLAN_MODEL};
use fitplan_db::config::DbConfig;

pub const DEFAULT_APP_ID: &str = "default-app-id";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub gemini: GeminiSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GeminiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagen_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// `postgres` or `memory`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the fitplan config directory: `$XDG_CONFIG_HOME/fitplan` or
/// `~/.config/fitplan`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("fitplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fitplan")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents).context("failed to parse config file")
}

/// Write the config file with mode 0600, creating parent dirs as needed.
/// It may hold an API key.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend {other:?} (expected postgres or memory)"),
        }
    }
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct FitplanConfig {
    pub db_config: DbConfig,
    /// `None` disables plan generation and makes image generation return
    /// placeholders.
    pub api_key: Option<String>,
    pub plan_model: String,
    pub image_model: String,
    pub imagen_model: String,
    pub app_id: String,
    pub generation_timeout: Duration,
    pub store: StoreBackend,
}

/// First non-empty environment variable among `names`.
fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| std::env::var(n).ok())
        .find(|v| !v.trim().is_empty())
}

impl FitplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// | setting | env | file |
    /// |---|---|---|
    /// | DB URL (also `--database-url`) | `FITPLAN_DATABASE_URL` | `database.url` |
    /// | API key | `GEMINI_API_KEY`, `GOOGLE_API_KEY` | `gemini.api_key` |
    /// | plan model | `FITPLAN_PLAN_MODEL` | `gemini.plan_model` |
    /// | image models | `GEMINI_MODEL`, `IMAGEN_MODEL` | `gemini.image_model`, `gemini.imagen_model` |
    /// | deadline | `FITPLAN_GENERATION_TIMEOUT_SECS` | `gemini.generation_timeout_secs` |
    /// | app id | `FITPLAN_APP_ID` | `server.app_id` |
    /// | store | `FITPLAN_STORE` | `server.store` |
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config().ok().unwrap_or_default();

        let db_url = cli_db_url
            .map(str::to_string)
            .or_else(|| env_first(&[DbConfig::URL_ENV]))
            .or_else(|| Some(file.database.url.clone()).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_string());

        let api_key = env_first(&["GEMINI_API_KEY", "GOOGLE_API_KEY"])
            .or_else(|| file.gemini.api_key.clone().filter(|k| !k.trim().is_empty()));

        let plan_model = env_first(&["FITPLAN_PLAN_MODEL"])
            .or(file.gemini.plan_model.clone())
            .unwrap_or_else(|| DEFAULT_PLAN_MODEL.to_string());
        let image_model = env_first(&["GEMINI_MODEL"])
            .or(file.gemini.image_model.clone())
            .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string());
        let imagen_model = env_first(&["IMAGEN_MODEL"])
            .or(file.gemini.imagen_model.clone())
            .unwrap_or_else(|| DEFAULT_SECONDARY_MODEL.to_string());

        let generation_timeout = match env_first(&["FITPLAN_GENERATION_TIMEOUT_SECS"]) {
            Some(raw) => Duration::from_secs(raw.trim().parse().with_context(|| {
                format!("FITPLAN_GENERATION_TIMEOUT_SECS is not a number of seconds: {raw:?}")
            })?),
            None => file
                .gemini
                .generation_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEADLINE),
        };

        let app_id = env_first(&["FITPLAN_APP_ID"])
            .or(file.server.app_id.clone())
            .unwrap_or_else(|| DEFAULT_APP_ID.to_string());

        let store = match env_first(&["FITPLAN_STORE"]).or(file.server.store.clone()) {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Postgres,
        };

        Ok(Self {
            db_config: DbConfig::new(db_url),
            api_key,
            plan_model,
            image_model,
            imagen_model,
            app_id,
            generation_timeout,
            store,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{EnvGuard, lock_env};

    const ALL_VARS: &[&str] = &[
        "FITPLAN_DATABASE_URL",
        "GEMINI_API_KEY",
        "GOOGLE_API_KEY",
        "FITPLAN_PLAN_MODEL",
        "GEMINI_MODEL",
        "IMAGEN_MODEL",
        "FITPLAN_GENERATION_TIMEOUT_SECS",
        "FITPLAN_APP_ID",
        "FITPLAN_STORE",
    ];

    /// Clear every fitplan variable and point the config dir at `dir`.
    fn isolated(dir: &std::path::Path) -> EnvGuard {
        let mut guard = EnvGuard::new();
        for var in ALL_VARS {
            guard.remove(var);
        }
        guard.set("XDG_CONFIG_HOME", dir.to_str().unwrap());
        guard
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = isolated(tmp.path());

        let config = FitplanConfig::resolve(None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.api_key, None);
        assert_eq!(config.plan_model, "gemini-2.5-flash");
        assert_eq!(config.image_model, "gemini-nano-banana");
        assert_eq!(config.imagen_model, "imagen-3.0-generate-002");
        assert_eq!(config.app_id, "default-app-id");
        assert_eq!(config.generation_timeout, Duration::from_secs(90));
        assert_eq!(config.store, StoreBackend::Postgres);
    }

    #[test]
    fn cli_flag_overrides_env() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let mut env = isolated(tmp.path());
        env.set("FITPLAN_DATABASE_URL", "postgresql://env:5432/envdb");

        let config = FitplanConfig::resolve(Some("postgresql://cli:5432/clidb")).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
    }

    #[test]
    fn env_overrides_config_file() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let mut env = isolated(tmp.path());

        let file = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://file:5432/filedb".into(),
            },
            gemini: GeminiSection {
                api_key: Some("file-key".into()),
                plan_model: Some("file-model".into()),
                ..Default::default()
            },
            server: ServerSection {
                app_id: Some("file-app".into()),
                store: Some("memory".into()),
            },
        };
        save_config(&file).unwrap();

        let from_file = FitplanConfig::resolve(None).unwrap();
        assert_eq!(from_file.db_config.database_url, "postgresql://file:5432/filedb");
        assert_eq!(from_file.api_key.as_deref(), Some("file-key"));
        assert_eq!(from_file.plan_model, "file-model");
        assert_eq!(from_file.app_id, "file-app");
        assert_eq!(from_file.store, StoreBackend::Memory);

        env.set("FITPLAN_DATABASE_URL", "postgresql://env:5432/envdb");
        env.set("GOOGLE_API_KEY", "google-key");
        env.set("FITPLAN_APP_ID", "env-app");
        let from_env = FitplanConfig::resolve(None).unwrap();
        assert_eq!(from_env.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(from_env.api_key.as_deref(), Some("google-key"));
        assert_eq!(from_env.app_id, "env-app");
    }

    #[test]
    fn gemini_key_wins_over_google_key() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let mut env = isolated(tmp.path());
        env.set("GOOGLE_API_KEY", "google");
        env.set("GEMINI_API_KEY", "gemini");

        let config = FitplanConfig::resolve(None).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("gemini"));
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let mut env = isolated(tmp.path());
        env.set("FITPLAN_GENERATION_TIMEOUT_SECS", "soon");

        let err = FitplanConfig::resolve(None).unwrap_err();
        assert!(format!("{err:#}").contains("FITPLAN_GENERATION_TIMEOUT_SECS"));
    }

    #[test]
    fn store_backend_parsing() {
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("postgresql".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = isolated(tmp.path());

        save_config(&ConfigFile::default()).unwrap();
        let meta = std::fs::metadata(config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let _lock = lock_env();
        assert!(config_path().ends_with("fitplan/config.toml"));
    }
}
