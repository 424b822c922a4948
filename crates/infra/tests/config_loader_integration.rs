//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files and
//! building a provider from it.

use std::io::Write;

use flowery_core::UserDirectory;
use flowery_infra::{config, OAuthUserProvider};
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_toml_file_and_build_provider() {
    let toml_content = r#"
[[providers]]
provider_key = "corp"
display_name = "Corporate SSO"
authority = "https://id.example.com/"
client_id = "flowery-desktop"
client_secret = "s3cret"
redirect_uri = "http://127.0.0.1:7890/"
supports_presence = true

[http]
timeout_seconds = 15
user_agent = "flowery-tests"
"#;

    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(toml_content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("toml");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    let config = result.expect("Failed to load config from TOML file");
    let provider_config = config.provider("corp").expect("provider entry").clone();
    assert_eq!(provider_config.authority_base(), "https://id.example.com");
    assert_eq!(config.http.user_agent.as_deref(), Some("flowery-tests"));

    let provider = OAuthUserProvider::builder(provider_config)
        .http_settings(config.http.clone())
        .build()
        .expect("provider from config");
    assert_eq!(provider.metadata().display_name, "Corporate SSO");
    assert!(provider.metadata().supports_presence);
}

#[test]
fn test_load_config_with_multiple_providers_from_json_file() {
    let json_content = r#"{
        "providers": [
            { "provider_key": "corp", "authority": "https://id.example.com", "client_id": "a" },
            { "provider_key": "github", "authority": "https://github.example.com", "client_id": "b",
              "scope": "openid read:user", "loopback_port": 0 }
        ]
    }"#;

    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(json_content.as_bytes()).expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("json");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    let config = result.expect("Failed to load config from JSON file");
    assert_eq!(config.providers.len(), 2);
    let github = config.provider("github").expect("github provider");
    assert_eq!(github.scope, "openid read:user");
    assert_eq!(github.loopback_port, 0);
    assert_eq!(config.provider("corp").expect("corp provider").loopback_port, 7890);
}

#[test]
fn test_load_config_rejects_unknown_extension() {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(b"providers: []").expect("Failed to write to temp file");

    let path = temp_file.path().with_extension("yaml");
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");

    let result = config::load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    assert!(result.is_err(), "yaml is not a supported config format");
}
