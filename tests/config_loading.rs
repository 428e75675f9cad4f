//! Configuration loading from TOML files

use mqrpc::config::ConfigError;
use mqrpc::RpcConfig;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_full_config_from_file() {
    let file = write_config(
        r#"
        server_id = "grid-1"
        host = "broker.internal"
        port = 8883
        agent = true
        agent_workers = 4
        keep_alive_secs = 30
        username = "dpark"
        token_env = "RPC_TOKEN"
        "#,
    );

    let config = RpcConfig::from_file(file.path()).unwrap();
    assert_eq!(config.server_id, "grid-1");
    assert_eq!(config.host, "broker.internal");
    assert_eq!(config.port, 8883);
    assert!(config.agent);
    assert_eq!(config.agent_workers, 4);
    assert_eq!(config.keep_alive_secs, 30);
    assert_eq!(config.username.as_deref(), Some("dpark"));
}

#[test]
fn minimal_file_gets_defaults() {
    let file = write_config("server_id = \"grid-1\"\n");

    let config = RpcConfig::from_file(file.path()).unwrap();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 1883);
    assert!(!config.agent);
    assert_eq!(config.agent_workers, 8);
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let file = write_config("server_id = [broken\n");

    let error = RpcConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(error, ConfigError::Parse(_)));
}

#[test]
fn invalid_server_id_rejected_at_load_time() {
    let file = write_config("server_id = \"has space\"\n");

    let error = RpcConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(error, ConfigError::InvalidConfig(_)));
}

#[test]
fn missing_file_is_a_read_error() {
    let error = RpcConfig::from_file("/nonexistent/mqrpc.toml").unwrap_err();
    assert!(matches!(error, ConfigError::FileRead(_)));
}

#[test]
fn token_resolved_from_environment() {
    let mut config = RpcConfig::new("grid-1");
    config.token_env = Some("MQRPC_TEST_TOKEN_VAR".to_string());
    assert_eq!(config.token(), None);

    std::env::set_var("MQRPC_TEST_TOKEN_VAR", "secret-token");
    assert_eq!(config.token().as_deref(), Some("secret-token"));
    std::env::remove_var("MQRPC_TEST_TOKEN_VAR");
}
