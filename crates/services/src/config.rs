//! Application configuration: a TOML file plus `TUTOR_*` environment overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tutor_core::model::UserId;

use crate::error::ConfigError;

pub const ENV_BACKEND: &str = "TUTOR_BACKEND";
pub const ENV_DB_URL: &str = "TUTOR_DB_URL";
pub const ENV_REST_URL: &str = "TUTOR_REST_URL";
pub const ENV_REST_ANON_KEY: &str = "TUTOR_REST_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "TUTOR_ACCESS_TOKEN";
pub const ENV_CACHE_DIR: &str = "TUTOR_CACHE_DIR";
pub const ENV_USER_ID: &str = "TUTOR_USER_ID";

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tutor.toml";

fn default_db_url() -> String {
    "sqlite://tutor.sqlite3".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".tutor-cache")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Sqlite,
    Rest,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "rest" => Ok(Self::Rest),
            _ => Err(ConfigError::UnknownBackend(raw.to_string())),
        }
    }
}

/// Where learner state is persisted.
///
/// Custom `Debug` masks the keys.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory,
    Sqlite {
        #[serde(default = "default_db_url")]
        url: String,
    },
    Rest {
        base_url: String,
        anon_key: String,
        #[serde(default)]
        access_token: Option<String>,
    },
}

impl BackendConfig {
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Memory => BackendKind::Memory,
            BackendConfig::Sqlite { .. } => BackendKind::Sqlite,
            BackendConfig::Rest { .. } => BackendKind::Rest,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite {
            url: default_db_url(),
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendConfig::Memory => f.write_str("Memory"),
            BackendConfig::Sqlite { url } => f.debug_struct("Sqlite").field("url", url).finish(),
            BackendConfig::Rest {
                base_url,
                anon_key: _,
                access_token,
            } => f
                .debug_struct("Rest")
                .field("base_url", base_url)
                .field("anon_key", &"***")
                .field("access_token", &access_token.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Learner to act as on local backends. The rest backend asks its auth
    /// endpoint instead.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            cache_dir: default_cache_dir(),
            user_id: None,
        }
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load `path` (or `tutor.toml` if present), then apply the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an explicit file cannot be read, the file is
    /// malformed, or an override is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::read_file(local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Override fields from `TUTOR_*` variables as returned by `lookup`.
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownBackend` for a bad `TUTOR_BACKEND`,
    /// `ConfigError::Missing` when the rest backend lacks its URL or key, and
    /// `ConfigError::InvalidUser` for a malformed `TUTOR_USER_ID`.
    pub fn apply_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let kind = match var(ENV_BACKEND) {
            Some(raw) => raw.parse()?,
            None => self.backend.kind(),
        };
        self.backend = match (kind, self.backend) {
            (BackendKind::Memory, _) => BackendConfig::Memory,
            (BackendKind::Sqlite, current) => {
                let url = match current {
                    BackendConfig::Sqlite { url } => Some(url),
                    _ => None,
                };
                BackendConfig::Sqlite {
                    url: var(ENV_DB_URL).or(url).unwrap_or_else(default_db_url),
                }
            }
            (BackendKind::Rest, current) => {
                let (base_url, anon_key, access_token) = match current {
                    BackendConfig::Rest {
                        base_url,
                        anon_key,
                        access_token,
                    } => (Some(base_url), Some(anon_key), access_token),
                    _ => (None, None, None),
                };
                BackendConfig::Rest {
                    base_url: var(ENV_REST_URL)
                        .or(base_url)
                        .ok_or(ConfigError::Missing(ENV_REST_URL))?,
                    anon_key: var(ENV_REST_ANON_KEY)
                        .or(anon_key)
                        .ok_or(ConfigError::Missing(ENV_REST_ANON_KEY))?,
                    access_token: var(ENV_ACCESS_TOKEN).or(access_token),
                }
            }
        };

        if let Some(dir) = var(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var(ENV_USER_ID) {
            let user = raw.parse().map_err(|_| ConfigError::InvalidUser(raw.clone()))?;
            self.user_id = Some(user);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_to_local_sqlite() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.backend,
            BackendConfig::Sqlite {
                url: "sqlite://tutor.sqlite3".to_string()
            }
        );
        assert_eq!(config.cache_dir, PathBuf::from(".tutor-cache"));
    }

    #[test]
    fn parses_rest_backend_from_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            cache_dir = "/tmp/tutor"

            [backend]
            type = "rest"
            base_url = "https://project.example"
            anon_key = "anon"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.kind(), BackendKind::Rest);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/tutor"));
    }

    #[test]
    fn env_overrides_file_values() {
        let config = AppConfig::default()
            .apply_env(env(&[
                (ENV_DB_URL, "sqlite://other.sqlite3"),
                (ENV_CACHE_DIR, "cache"),
                (ENV_USER_ID, "6f1c2f52-1a43-4b9e-9a57-3e1f1c7d9b20"),
            ]))
            .unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Sqlite {
                url: "sqlite://other.sqlite3".to_string()
            }
        );
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert!(config.user_id.is_some());
    }

    #[test]
    fn rest_backend_requires_url_and_key() {
        let err = AppConfig::default()
            .apply_env(env(&[(ENV_BACKEND, "rest"), (ENV_REST_URL, "https://x.example")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_REST_ANON_KEY)));

        let config = AppConfig::default()
            .apply_env(env(&[
                (ENV_BACKEND, "REST"),
                (ENV_REST_URL, "https://x.example"),
                (ENV_REST_ANON_KEY, "anon"),
                (ENV_ACCESS_TOKEN, "token"),
            ]))
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("anon\""));
        assert!(!debug.contains("token\""));
    }

    #[test]
    fn rejects_unknown_backend_and_bad_user() {
        assert!(matches!(
            AppConfig::default().apply_env(env(&[(ENV_BACKEND, "mongo")])),
            Err(ConfigError::UnknownBackend(_))
        ));
        assert!(matches!(
            AppConfig::default().apply_env(env(&[(ENV_USER_ID, "not-a-uuid")])),
            Err(ConfigError::InvalidUser(_))
        ));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = AppConfig::default()
            .apply_env(env(&[(ENV_BACKEND, "  "), (ENV_CACHE_DIR, "")]))
            .unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
