use dal_engine::config::{
    HTTP_TIMEOUT_SECS_ENV, LOGGING_ENV, MAX_RESPONSE_BYTES_ENV, RAGGED_ROWS_ENV,
    TRUNCATE_ATTRIBUTES_ENV, USER_AGENT_ENV,
};
use dal_engine::{AttributeLimits, ClientConfig, RaggedRowPolicy};
use serial_test::serial;
use std::time::Duration;

const ALL: [&str; 6] = [
    HTTP_TIMEOUT_SECS_ENV,
    USER_AGENT_ENV,
    MAX_RESPONSE_BYTES_ENV,
    RAGGED_ROWS_ENV,
    TRUNCATE_ATTRIBUTES_ENV,
    LOGGING_ENV,
];

fn clear_env() {
    for key in ALL {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    assert_eq!(ClientConfig::from_env(), ClientConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var(HTTP_TIMEOUT_SECS_ENV, "5");
    std::env::set_var(USER_AGENT_ENV, "survey-bot/2");
    std::env::set_var(MAX_RESPONSE_BYTES_ENV, "1024");
    std::env::set_var(RAGGED_ROWS_ENV, "Reject");
    std::env::set_var(TRUNCATE_ATTRIBUTES_ENV, "off");
    std::env::set_var(LOGGING_ENV, "0");

    let config = ClientConfig::from_env();
    clear_env();

    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.user_agent, "survey-bot/2");
    assert_eq!(config.max_response_bytes, 1024);
    assert_eq!(config.build.ragged_rows, RaggedRowPolicy::Reject);
    assert_eq!(config.build.attribute_limits, AttributeLimits::unbounded());
    assert!(!config.logging_enabled);
}

#[test]
#[serial]
fn test_from_env_ignores_unparsable_values() {
    clear_env();
    std::env::set_var(HTTP_TIMEOUT_SECS_ENV, "soon");
    std::env::set_var(RAGGED_ROWS_ENV, "sometimes");
    std::env::set_var(LOGGING_ENV, "maybe");

    let config = ClientConfig::from_env();
    clear_env();

    let defaults = ClientConfig::default();
    assert_eq!(config.timeout, defaults.timeout);
    assert_eq!(config.build.ragged_rows, RaggedRowPolicy::Pad);
    assert!(config.logging_enabled);
}
