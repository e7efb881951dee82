//! Tests for configuration resolution and database bootstrap
//!
//! Tests that touch HRMS_* environment variables are marked #[serial] so
//! they never observe each other's values.

use hrms_common::config::{
    ensure_root_folder, parse_toml_config, resolve_root_folder, resolve_token_secret, TomlConfig,
    DATABASE_FILE, ROOT_FOLDER_ENV, TOKEN_SECRET_ENV,
};
use hrms_common::db::{get_setting, init_database, init_memory_database, set_setting};
use serial_test::serial;
use std::path::{Path, PathBuf};

// ============================================================================
// TOML parsing
// ============================================================================

#[test]
fn test_parse_toml_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/hrms"
port = 8080
token_secret = "from-toml"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = parse_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/hrms")));
    assert_eq!(config.port(), 8080);
    assert_eq!(config.bind_address(), "127.0.0.1");
    assert_eq!(config.logging.level.as_deref(), Some("debug"));
}

#[test]
fn test_parse_invalid_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let err = parse_toml_config(&path).unwrap_err();
    assert!(matches!(err, hrms_common::Error::Config(_)));
}

// ============================================================================
// Root folder
// ============================================================================

#[test]
#[serial]
fn test_root_folder_priority() {
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    std::env::set_var(ROOT_FOLDER_ENV, "/from/env");
    assert_eq!(
        resolve_root_folder(Some(Path::new("/from/cli")), &config),
        PathBuf::from("/from/cli")
    );
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));

    std::env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

    let fallback = resolve_root_folder(None, &TomlConfig::default());
    assert!(fallback.ends_with("hrms") || fallback.ends_with("hrms_data"));
}

#[test]
fn test_ensure_root_folder_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("hrms");

    let db_path = ensure_root_folder(&root).unwrap();
    assert!(root.is_dir());
    assert_eq!(db_path, root.join(DATABASE_FILE));
}

// ============================================================================
// Token secret
// ============================================================================

#[tokio::test]
#[serial]
async fn test_env_secret_wins() {
    let pool = init_memory_database().await.unwrap();
    let config = TomlConfig {
        token_secret: Some("from-toml".to_string()),
        ..Default::default()
    };

    std::env::set_var(TOKEN_SECRET_ENV, "from-env");
    let secret = resolve_token_secret(&pool, &config).await.unwrap();
    std::env::remove_var(TOKEN_SECRET_ENV);

    assert_eq!(secret, "from-env");
}

#[tokio::test]
#[serial]
async fn test_toml_secret_then_stored_secret() {
    std::env::remove_var(TOKEN_SECRET_ENV);
    let pool = init_memory_database().await.unwrap();

    let config = TomlConfig {
        token_secret: Some("from-toml".to_string()),
        ..Default::default()
    };
    assert_eq!(resolve_token_secret(&pool, &config).await.unwrap(), "from-toml");

    set_setting(&pool, "token_secret", "stored").await.unwrap();
    assert_eq!(
        resolve_token_secret(&pool, &TomlConfig::default()).await.unwrap(),
        "stored"
    );
}

#[tokio::test]
#[serial]
async fn test_generated_secret_is_persisted() {
    std::env::remove_var(TOKEN_SECRET_ENV);
    let pool = init_memory_database().await.unwrap();

    let first = resolve_token_secret(&pool, &TomlConfig::default()).await.unwrap();
    assert!(!first.is_empty());

    let stored: Option<String> = get_setting(&pool, "token_secret").await.unwrap();
    assert_eq!(stored.as_deref(), Some(first.as_str()));

    let second = resolve_token_secret(&pool, &TomlConfig::default()).await.unwrap();
    assert_eq!(first, second);
}

// ============================================================================
// Database file
// ============================================================================

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join(DATABASE_FILE);

    {
        let pool = init_database(&db_path).await.unwrap();
        set_setting(&pool, "payroll_working_days", 22u32).await.unwrap();
        pool.close().await;
    }
    assert!(db_path.exists());

    // Reopening reruns the idempotent schema without clobbering settings
    let pool = init_database(&db_path).await.unwrap();
    let days: Option<u32> = get_setting(&pool, "payroll_working_days").await.unwrap();
    assert_eq!(days, Some(22));
}
