use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::gate::AuthOptions;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "mdgate.toml";

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

// ── Server ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port (default: 3001)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ── Auth gate ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Run with the gate wide open (default: false)
    #[serde(default)]
    pub disabled: bool,
    /// Gate password; generated and printed at boot when absent
    #[serde(default)]
    pub password: Option<String>,
    /// Session lifetime in seconds (default: 86400)
    #[serde(default)]
    pub session_ttl_secs: Option<u64>,
}

impl Config {
    /// Load configuration: explicit path, else `mdgate.toml` in the working
    /// directory when present, else defaults. Environment wins over file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_from(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| ConfigError::Load(err.to_string()))
    }

    // Priority: environment variable > config file.
    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(password) = get("MDGATE_PASSWORD") {
            let password = password.trim();
            if !password.is_empty() {
                self.auth.password = Some(password.to_owned());
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::Validation("server.host must not be empty".into()));
        }
        if self.auth.session_ttl_secs == Some(0) {
            return Err(ConfigError::Validation(
                "auth.session_ttl_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Boot options handed to `AuthGate::setup`.
    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            disabled: self.auth.disabled,
            password: self.auth.password.clone(),
            session_ttl_secs: self.auth.session_ttl_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_bind_localhost() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3001);
        assert!(!config.auth.disabled);
        assert!(config.auth.password.is_none());
    }

    #[test]
    fn parses_full_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 8088

[auth]
password = "correct-horse"
session_ttl_secs = 3600
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.auth.password.as_deref(), Some("correct-horse"));
        assert_eq!(config.auth.session_ttl_secs, Some(3600));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[auth]\ndisabled = true\n").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert!(config.auth.disabled);
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[auth]\nsession_ttl_secs = 0\n").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("session_ttl_secs"));
    }

    #[test]
    fn env_password_wins_over_file_value() {
        let mut config = Config {
            auth: AuthConfig {
                password: Some("from-file".into()),
                ..AuthConfig::default()
            },
            ..Config::default()
        };
        config.apply_env_from(|name| {
            (name == "MDGATE_PASSWORD").then(|| "from-env".to_owned())
        });
        assert_eq!(config.auth.password.as_deref(), Some("from-env"));
    }

    #[test]
    fn blank_env_password_is_ignored() {
        let mut config = Config::default();
        config.apply_env_from(|_| Some("   ".to_owned()));
        assert!(config.auth.password.is_none());
    }

    #[test]
    fn auth_options_mirror_auth_section() {
        let config = Config {
            auth: AuthConfig {
                disabled: true,
                password: Some("pw".into()),
                session_ttl_secs: Some(60),
            },
            ..Config::default()
        };
        let options = config.auth_options();
        assert!(options.disabled);
        assert_eq!(options.password.as_deref(), Some("pw"));
        assert_eq!(options.session_ttl_secs, Some(60));
    }
}
