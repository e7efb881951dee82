//! Configuration loading and root folder resolution

use crate::auth::generate_secret;
use crate::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "HRMS_ROOT_FOLDER";
/// Environment variable carrying the session signing secret
pub const TOKEN_SECRET_ENV: &str = "HRMS_TOKEN_SECRET";
/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "hrms.db";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5730;

/// Optional settings read from `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub token_secret: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl TomlConfig {
    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Parse a TOML config file
pub fn parse_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
}

/// Load the platform config file, falling back to defaults when it is missing or broken
pub fn load_toml_config() -> TomlConfig {
    let Some(path) = config_file_path() else {
        return TomlConfig::default();
    };
    match parse_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config file: {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Create the root folder if needed and return the database path inside it
pub fn ensure_root_folder(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!("Created root folder: {}", root.display());
    }
    Ok(root.join(DATABASE_FILE))
}

/// Resolve the session signing secret
///
/// Environment and TOML win over the stored setting. With none of them set a
/// new secret is generated and stored so sessions survive restarts.
pub async fn resolve_token_secret(pool: &SqlitePool, config: &TomlConfig) -> Result<String> {
    if let Ok(secret) = std::env::var(TOKEN_SECRET_ENV) {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    if let Some(secret) = config.token_secret.as_ref().filter(|s| !s.is_empty()) {
        return Ok(secret.clone());
    }

    if let Some(secret) = crate::db::get_setting::<String>(pool, "token_secret").await? {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    let secret = generate_secret();
    crate::db::set_setting(pool, "token_secret", &secret).await?;
    warn!("No token secret configured; generated a new one and stored it in settings");
    Ok(secret)
}

fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("hrms").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/hrms/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hrms"))
        .unwrap_or_else(|| PathBuf::from("./hrms_data"))
}
