use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_deadswitch_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DEADSWITCH__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

fn assert_config_error(result: Result<WatchdogConfig>) {
    match result {
        Err(Error::Config(_)) => {}
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = WatchdogConfig::default();

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.switch.interval_ms, 60_000);
    assert_eq!(config.switch.retrigger_interval_ms, None);
    assert_eq!(config.switch.retrigger_interval(), config.switch.interval());
    assert_eq!(config.notification.targets, vec![NotificationTarget::Log]);
    assert_eq!(config.notification.retry.max_retries, 3);
    assert_eq!(config.engine.shutdown_grace_period_ms, 5000);
    assert!(config.logging.log_dir.is_none());
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_deadswitch_env_vars();
    with_vars(
        vec![
            ("DEADSWITCH__SWITCH__INTERVAL_MS", Some("2000")),
            ("DEADSWITCH__SWITCH__RETRIGGER_INTERVAL_MS", Some("1000")),
            ("DEADSWITCH__SERVER__PORT", Some("9090")),
        ],
        || {
            let config = WatchdogConfig::new().unwrap();

            assert_eq!(config.switch.interval_ms, 2000);
            assert_eq!(config.switch.retrigger_interval_ms, Some(1000));
            assert_eq!(config.server.port, 9090);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_deadswitch_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");

    std::fs::write(
        &config_path,
        r#"
        [switch]
        interval_ms = 30000

        [[notification.targets]]
        channel = "slack"
        webhook_url = "https://hooks.slack.com/services/T0/B0/X"
        username = "deadswitch"

        [[notification.targets]]
        channel = "webhook"
        url = "http://alerts.internal/hook"

        [[notification.targets]]
        channel = "email"
        smtp_url = "smtps://relay.example.com"
        from = "deadswitch <deadswitch@example.com>"
        to = "oncall@example.com"

        [notification.retry]
        max_retries = 5
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = WatchdogConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();

        assert_eq!(config.switch.interval_ms, 30_000);
        assert_eq!(
            config.notification.targets,
            vec![
                NotificationTarget::Slack {
                    webhook_url: "https://hooks.slack.com/services/T0/B0/X".to_string(),
                    username: Some("deadswitch".to_string()),
                },
                NotificationTarget::Webhook {
                    url: "http://alerts.internal/hook".to_string(),
                },
                NotificationTarget::Email {
                    smtp_url: "smtps://relay.example.com".to_string(),
                    from: "deadswitch <deadswitch@example.com>".to_string(),
                    to: "oncall@example.com".to_string(),
                },
            ]
        );
        assert_eq!(config.notification.retry.max_retries, 5);
        // untouched keys keep their defaults
        assert_eq!(config.notification.retry.timeout_ms, 5000);
        assert!(config.validate().is_ok());
    });
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_deadswitch_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("deadswitch.toml");
    std::fs::write(
        &config_path,
        r#"
        [switch]
        interval_ms = 10000
        max_switches = 50
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            ("CONFIG_PATH", Some(config_path.to_str().unwrap())),
            ("DEADSWITCH__SWITCH__INTERVAL_MS", Some("2000")),
        ],
        || {
            let config = WatchdogConfig::new().unwrap();

            assert_eq!(config.switch.interval_ms, 2000);
            assert_eq!(config.switch.max_switches, 50);
        },
    );
}

#[test]
#[serial]
fn missing_override_file_should_fail() {
    cleanup_all_deadswitch_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let config = WatchdogConfig::default();
    assert_config_error(config.with_override_config(missing.to_str().unwrap()));
}

#[test]
fn validation_should_reject_zero_intervals() {
    let mut config = WatchdogConfig::default();
    config.switch.interval_ms = 0;
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.switch.retrigger_interval_ms = Some(0);
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.switch.max_switches = 0;
    assert_config_error(config.validate());
}

#[test]
fn validation_should_reject_bad_server_settings() {
    let mut config = WatchdogConfig::default();
    config.server.port = 0;
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.server.listen_addr = "localhost:80".to_string();
    assert_config_error(config.validate());
}

#[test]
fn validation_should_reject_malformed_target_urls() {
    let mut config = WatchdogConfig::default();
    config.notification.targets = vec![NotificationTarget::Webhook {
        url: "not a url".to_string(),
    }];
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.notification.targets = vec![NotificationTarget::Slack {
        webhook_url: "ftp://hooks.example.com/x".to_string(),
        username: None,
    }];
    assert_config_error(config.validate());
}

fn email(
    smtp_url: &str,
    from: &str,
    to: &str,
) -> NotificationTarget {
    NotificationTarget::Email {
        smtp_url: smtp_url.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[test]
fn validation_should_check_email_targets() {
    let mut config = WatchdogConfig::default();
    config.notification.targets = vec![email(
        "smtp://127.0.0.1:2525",
        "deadswitch@example.com",
        "Ops <ops@example.com>",
    )];
    assert!(config.validate().is_ok());

    // relay must speak smtp(s)
    let mut config = WatchdogConfig::default();
    config.notification.targets = vec![email(
        "https://relay.example.com",
        "deadswitch@example.com",
        "ops@example.com",
    )];
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.notification.targets = vec![email(
        "smtps://relay.example.com",
        "not an address",
        "ops@example.com",
    )];
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.notification.targets = vec![email(
        "smtps://relay.example.com",
        "deadswitch@example.com",
        "",
    )];
    assert_config_error(config.validate());
}

#[test]
fn validation_should_accept_empty_target_list() {
    let mut config = WatchdogConfig::default();
    config.notification.targets.clear();
    assert!(config.validate().is_ok());
}

#[test]
fn validation_should_reject_inconsistent_backoff() {
    let mut config = WatchdogConfig::default();
    config.notification.retry.base_delay_ms = 20_000;
    config.notification.retry.max_delay_ms = 1_000;
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.notification.retry.max_retries = 0;
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.notification.retry.timeout_ms = 0;
    assert_config_error(config.validate());
}

#[test]
fn validation_should_reject_zero_engine_bounds() {
    let mut config = WatchdogConfig::default();
    config.engine.max_pending_deadlines = 0;
    assert_config_error(config.validate());

    let mut config = WatchdogConfig::default();
    config.engine.shutdown_grace_period_ms = 0;
    assert_config_error(config.validate());
}

#[test]
fn validation_should_reject_empty_log_filter() {
    let mut config = WatchdogConfig::default();
    config.logging.filter = "  ".to_string();
    assert_config_error(config.validate());
}
