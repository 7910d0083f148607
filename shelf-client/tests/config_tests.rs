use shelf_client::{ClientConfig, ConfigError};
use std::io::Write;

const VALID: &str = r#"
api_base_url = "http://localhost:8000"
relay_url = "http://localhost:3000"
request_timeout_ms = 5000

[session]
name = "Ada"
email = "ada@example.com"
id = "42"
"#;

fn base_config() -> ClientConfig {
    ClientConfig {
        api_base_url: "http://localhost:8000".to_string(),
        relay_url: "http://localhost:3000".to_string(),
        request_timeout_ms: 5_000,
        session: None,
    }
}

#[test]
fn config_parses_with_session() {
    let config = ClientConfig::from_toml(VALID).expect("valid config");
    assert!(config.validate().is_ok());
    assert_eq!(config.session.map(|s| s.id), Some("42".to_string()));
}

#[test]
fn config_session_is_optional() {
    let config = ClientConfig::from_toml(
        r#"
api_base_url = "http://localhost:8000"
relay_url = "http://localhost:3000"
request_timeout_ms = 1000
"#,
    )
    .expect("valid config");
    assert!(config.session.is_none());
}

#[test]
fn config_rejects_unknown_fields() {
    let toml = VALID.replace("[session]", "retries = 3\n[session]");
    assert!(matches!(
        ClientConfig::from_toml(&toml),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn config_requires_timeout() {
    let mut config = base_config();
    config.request_timeout_ms = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue {
            field: "request_timeout_ms",
            ..
        })
    ));
}

#[test]
fn config_requires_http_urls() {
    let mut config = base_config();
    config.relay_url = "localhost:3000".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidValue {
            field: "relay_url",
            ..
        })
    ));

    let mut config = base_config();
    config.api_base_url = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn config_loads_from_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(VALID.as_bytes()).expect("write config");
    let config = ClientConfig::load(Some(file.path())).expect("loads");
    assert_eq!(config.request_timeout_ms, 5_000);
}
