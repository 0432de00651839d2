//! Integration tests for the cast-server binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Temp dir with a config file pointing the database inside it
fn setup_test_env(bind: &str) -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("accounts.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[server]
bind = "{}"
frontend_url = "http://localhost:3000"
redirect_uri = "http://localhost:8081/api/oauth-callback"
"#,
        db_path.display().to_string().replace('\\', "/"),
        bind
    );
    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_str().unwrap().to_string())
}

fn server() -> Command {
    let mut cmd = Command::cargo_bin("cast-server").unwrap();
    for var in [
        "ENCRYPTION_KEY",
        "CROSSCAST_CONFIG",
        "CROSSCAST_BIND",
        "CROSSCAST_DB_PATH",
        "OAUTH_REDIRECT_URI",
        "FRONTEND_URL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_endpoints() {
    server()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("/api/oauth-connect"))
        .stdout(predicate::str::contains("ENCRYPTION_KEY"));
}

#[test]
fn test_version() {
    server()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cast-server"));
}

#[cfg(not(feature = "dev-key"))]
#[test]
fn test_missing_encryption_key_is_a_config_error() {
    let (_temp, config_path) = setup_test_env("127.0.0.1:0");

    server()
        .arg("--config")
        .arg(&config_path)
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Encryption key is not configured"));
}

#[test]
fn test_malformed_encryption_key_is_a_config_error() {
    let (_temp, config_path) = setup_test_env("127.0.0.1:0");

    server()
        .arg("--config")
        .arg(&config_path)
        .env("ENCRYPTION_KEY", "dG9vLXNob3J0")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Encryption key is invalid"));
}

#[test]
fn test_invalid_bind_address() {
    let (_temp, config_path) = setup_test_env("not-an-address");

    server()
        .arg("--config")
        .arg(&config_path)
        .env("ENCRYPTION_KEY", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("server.bind"));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[platforms]\nenabled = [\"myspace\"]\n").unwrap();

    server()
        .arg("--config")
        .arg(&config_path)
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(2);
}
