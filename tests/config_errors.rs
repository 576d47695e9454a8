use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use backup_supervisor::config::{load_and_validate, load_from_str, parse_duration, Feature};
use backup_supervisor::errors::SupervisorError;
use backup_supervisor::retry::Backoff;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn expect_config_error(contents: &str, needle: &str) {
    match load_from_str(contents) {
        Err(SupervisorError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn empty_file_uses_defaults() {
    let file = write_config("");

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.deployment.prefix(), "service-fabrik");
    assert_eq!(cfg.deployment.network_segment_length(), 4);
    assert_eq!(cfg.start_retry.max_attempts(), Some(3));
    assert_eq!(cfg.poll.max_duration(), Some(Duration::from_secs(300)));
    assert!(matches!(cfg.poll.backoff(), Backoff::Exponential { .. }));
    assert_eq!(cfg.log_tail, None);
    assert!(!cfg.features.is_enabled(Feature::ScheduledBackup));
    assert!(cfg.features.is_enabled(Feature::LogCapture));
}

#[test]
fn full_file_is_loaded() {
    let file = write_config(
        r#"
[deployment]
prefix = "sf"
network_segment_length = 2

[agent]
min_version = "1.4"
start_retry = { strategy = "constant", interval = "250ms", max_attempts = 5 }

[poll]
strategy = "exponential"
interval = "2s"
max_interval = "1m"
factor = 3
timeout = "10m"
jitter = 0.1

[logs]
tail = 500

[features]
scheduled_backup = true
log_capture = false
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.deployment.prefix(), "sf");
    assert_eq!(cfg.min_agent_version.unwrap().to_string(), "1.4.0");
    assert_eq!(cfg.start_retry.max_attempts(), Some(5));
    assert_eq!(
        cfg.poll.backoff(),
        Backoff::Exponential {
            initial: Duration::from_secs(2),
            factor: 3,
            max: Duration::from_secs(60),
        }
    );
    assert_eq!(cfg.log_tail, Some(500));
    assert!(cfg.features.is_enabled(Feature::ScheduledBackup));
    assert!(!cfg.features.is_enabled(Feature::LogCapture));
}

#[test]
fn unknown_feature_flag_is_rejected() {
    expect_config_error("[features]\nturbo_mode = true\n", "turbo_mode");
}

#[test]
fn unknown_keys_are_rejected() {
    match load_from_str("[logs]\ntail = 5\nlines = 7\n") {
        Err(SupervisorError::TomlError(e)) => assert!(e.to_string().contains("lines")),
        other => panic!("Expected TomlError, got: {:?}", other.map(|_| ())),
    }
}

#[test]
fn unbounded_policy_is_rejected() {
    expect_config_error(
        "[poll]\nstrategy = \"constant\"\ninterval = \"1s\"\n",
        "needs max_attempts or timeout",
    );
}

#[test]
fn constant_policy_rejects_exponential_fields() {
    expect_config_error(
        "[poll]\nstrategy = \"constant\"\ninterval = \"1s\"\nmax_interval = \"5s\"\ntimeout = \"1m\"\n",
        "max_interval",
    );
}

#[test]
fn bad_policy_values_are_rejected() {
    expect_config_error("[poll]\ninterval = \"0s\"\ntimeout = \"1m\"\n", "interval must be > 0");
    expect_config_error("[poll]\ninterval = \"soon\"\ntimeout = \"1m\"\n", "[poll].interval");
    expect_config_error(
        "[poll]\nstrategy = \"exponential\"\ninterval = \"10s\"\nmax_interval = \"1s\"\ntimeout = \"1m\"\n",
        "must be >= interval",
    );
    expect_config_error(
        "[poll]\nstrategy = \"exponential\"\ninterval = \"1s\"\nfactor = 1\ntimeout = \"1m\"\n",
        "factor must be >= 2",
    );
    expect_config_error("[poll]\ninterval = \"1s\"\njitter = 1.5\ntimeout = \"1m\"\n", "jitter");
    expect_config_error(
        "[agent]\nstart_retry = { interval = \"1s\", max_attempts = 0 }\n",
        "max_attempts must be >= 1",
    );
}

#[test]
fn oversized_durations_are_rejected() {
    assert_eq!(
        parse_duration("5124095576030431h").unwrap(),
        Duration::from_secs(5124095576030431 * 3600)
    );
    assert!(parse_duration("5124095576030432h").unwrap_err().contains("too large"));
    assert!(parse_duration("307445734561825861m").unwrap_err().contains("too large"));
    expect_config_error(
        "[poll]\ninterval = \"1s\"\ntimeout = \"18446744073709551615h\"\n",
        "[poll].timeout: invalid duration",
    );
}

#[test]
fn bad_grammar_constants_are_rejected() {
    expect_config_error("[deployment]\nnetwork_segment_length = 0\n", "network_segment_length");
    expect_config_error("[deployment]\nprefix = \"\"\n", "prefix");
}

#[test]
fn bad_min_version_is_rejected() {
    expect_config_error("[agent]\nmin_version = \"one.two\"\n", "[agent].min_version");
}

#[test]
fn feature_lookup_by_name_rejects_undefined_names() {
    let cfg = load_from_str("").unwrap();

    assert!(cfg.features.is_enabled_by_name("log_capture").unwrap());
    assert!(matches!(
        cfg.features.is_enabled_by_name("undefined_flag"),
        Err(SupervisorError::Validation(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_and_validate(dir.path().join("absent.toml"));

    assert!(matches!(result, Err(SupervisorError::IoError(_))));
}
