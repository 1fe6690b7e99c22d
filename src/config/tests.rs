use super::*;
use std::io::Write;

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_defaults_with_only_private_key() {
    let config = NotifierConfig::load_from(vars(&[("JWT_PRIVATE_KEY", "a2V5")])).unwrap();

    assert_eq!(config.application_name, "event_api");
    assert_eq!(config.jwt.algorithm, "RS256");
    assert_eq!(config.jwt.private_key, "a2V5");
    assert_eq!(
        config.broker.credentials(),
        BrokerCredentials::Params {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
        }
    );
}

#[test]
fn test_missing_private_key_fails_fast() {
    let result = NotifierConfig::load_from(vars(&[("APPLICATION_NAME", "svc")]));
    assert!(matches!(result, Err(ConfigError::Missing("jwt.private_key"))));
}

#[test]
fn test_flat_env_vars_override_defaults() {
    let config = NotifierConfig::load_from(vars(&[
        ("APPLICATION_NAME", "peatio"),
        ("JWT_PRIVATE_KEY", "a2V5"),
        ("EVENT_API_JWT_ALGORITHM", "ES256"),
        ("EVENT_API_RABBITMQ_HOST", "rabbit.internal"),
        ("EVENT_API_RABBITMQ_PORT", "5673"),
        ("EVENT_API_RABBITMQ_USERNAME", "producer"),
        ("EVENT_API_RABBITMQ_PASSWORD", "s3cret"),
    ]))
    .unwrap();

    assert_eq!(config.application_name, "peatio");
    assert_eq!(config.jwt.algorithm, "ES256");
    assert_eq!(
        config.broker.credentials(),
        BrokerCredentials::Params {
            host: "rabbit.internal".to_string(),
            port: 5673,
            username: "producer".to_string(),
            password: "s3cret".to_string(),
        }
    );
}

#[test]
fn test_url_takes_precedence_over_params() {
    let config = NotifierConfig::load_from(vars(&[
        ("JWT_PRIVATE_KEY", "a2V5"),
        ("EVENT_API_RABBITMQ_URL", "amqp://u:p@broker:5672/%2f"),
        ("EVENT_API_RABBITMQ_HOST", "ignored"),
    ]))
    .unwrap();

    assert_eq!(
        config.broker.credentials(),
        BrokerCredentials::Url("amqp://u:p@broker:5672/%2f".to_string())
    );
}

#[test]
fn test_empty_url_falls_back_to_params() {
    let config = NotifierConfig::load_from(vars(&[
        ("JWT_PRIVATE_KEY", "a2V5"),
        ("EVENT_API_RABBITMQ_URL", ""),
    ]))
    .unwrap();

    assert!(matches!(
        config.broker.credentials(),
        BrokerCredentials::Params { .. }
    ));
}

#[test]
fn test_structured_env_vars() {
    let config = NotifierConfig::load_from(vars(&[
        ("EVENT_API__APPLICATION_NAME", "ledger"),
        ("EVENT_API__JWT__PRIVATE_KEY", "a2V5"),
        ("EVENT_API__BROKER__HOST", "mq"),
    ]))
    .unwrap();

    assert_eq!(config.application_name, "ledger");
    assert!(matches!(
        config.broker.credentials(),
        BrokerCredentials::Params { ref host, .. } if host == "mq"
    ));
}

#[test]
fn test_flat_env_vars_win_over_structured() {
    let config = NotifierConfig::load_from(vars(&[
        ("EVENT_API__APPLICATION_NAME", "structured"),
        ("APPLICATION_NAME", "flat"),
        ("JWT_PRIVATE_KEY", "a2V5"),
    ]))
    .unwrap();

    assert_eq!(config.application_name, "flat");
}

#[test]
fn test_yaml_file_source() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "application_name: from_file\njwt:\n  algorithm: ES384\n  private_key: a2V5\nbroker:\n  url: amqp://file-broker"
    )
    .unwrap();
    let path = file.path().to_string_lossy().to_string();

    let config = NotifierConfig::load_from(vars(&[(CONFIG_ENV_VAR, &path)])).unwrap();

    assert_eq!(config.application_name, "from_file");
    assert_eq!(config.jwt.algorithm, "ES384");
    assert_eq!(
        config.broker.credentials(),
        BrokerCredentials::Url("amqp://file-broker".to_string())
    );
}

#[test]
fn test_debug_redacts_secrets() {
    let config = NotifierConfig {
        jwt: JwtConfig {
            algorithm: "RS256".to_string(),
            private_key: "super-secret-key".to_string(),
        },
        broker: BrokerConfig {
            password: "hunter2".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    let rendered = format!("{:?}", config);
    assert!(!rendered.contains("super-secret-key"));
    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("<redacted>"));
}
