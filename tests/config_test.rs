use std::time::Duration;

use fetchq::config::Config;
use fetchq::config::secrets::ExposeSecret;

// Environment variables are process-wide, so every case runs in one test.
#[test]
fn config_from_env() {
    unsafe {
        std::env::remove_var("FETCHQ_TIMEOUT_SECS");
        std::env::remove_var("FETCHQ_USER_AGENT");
        std::env::remove_var("FETCHQ_BEARER_TOKEN");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert!(config.user_agent.starts_with("fetchq/"));
    assert!(config.bearer_token.is_none());
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("FETCHQ_TIMEOUT_SECS", "5");
        std::env::set_var("FETCHQ_USER_AGENT", "tester/1.0");
        std::env::set_var("FETCHQ_BEARER_TOKEN", "sk-test");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.user_agent, "tester/1.0");
    assert_eq!(
        config.bearer_token.as_ref().map(|t| t.expose_secret().to_string()),
        Some("sk-test".to_string())
    );
    assert!(!format!("{config:?}").contains("sk-test"));

    unsafe {
        std::env::set_var("FETCHQ_TIMEOUT_SECS", "soon");
    }
    let result = Config::from_env();
    assert!(matches!(result, Err(fetchq::Error::Config(_))));

    unsafe {
        std::env::remove_var("FETCHQ_TIMEOUT_SECS");
        std::env::remove_var("FETCHQ_USER_AGENT");
        std::env::remove_var("FETCHQ_BEARER_TOKEN");
    }
}
