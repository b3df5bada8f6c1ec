// tokenbucket-core/tests/config_integration_tests.rs
use anyhow::Result;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use test_log::test;

use tokenbucket_core::config::{BucketConfig, RefillSchedule, MIN_TICK_GRANULARITY};
use tokenbucket_core::{BucketError, TokenBucket};

fn write_config(yaml: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;
    Ok(file)
}

#[test]
fn test_load_from_file_with_defaults() -> Result<()> {
    let file = write_config(
        r#"
refill_interval_ms: 500
capacity: 10
"#,
    )?;

    let config = BucketConfig::load_from_file(file.path())?;
    assert_eq!(config.capacity, 10);
    assert_eq!(config.refill_interval_ms, 500.0);

    let settings = config.settings()?;
    assert_eq!(
        settings.schedule,
        RefillSchedule {
            period: Duration::from_millis(500),
            increment: 1
        }
    );
    Ok(())
}

#[test]
fn test_load_from_file_with_overrides() -> Result<()> {
    let file = write_config(
        r#"
refill_interval_ms: 2.5
capacity: 100
min_tick_ms: 10
mailbox_capacity: 64
"#,
    )?;

    let settings = BucketConfig::load_from_file(file.path())?.settings()?;
    assert_eq!(settings.schedule.period, Duration::from_millis(10));
    assert_eq!(settings.schedule.increment, 4);
    assert_eq!(settings.mailbox_capacity, 64);
    Ok(())
}

#[test]
fn test_load_rejects_invalid_values() -> Result<()> {
    let zero_interval = write_config("refill_interval_ms: 0\ncapacity: 10\n")?;
    let err = BucketConfig::load_from_file(zero_interval.path()).unwrap_err();
    assert!(
        err.chain().any(|cause| cause.to_string().contains("refill_interval_ms must be a positive value")),
        "unexpected error: {err:?}"
    );

    let zero_capacity = write_config("refill_interval_ms: 100\ncapacity: 0\n")?;
    let err = BucketConfig::load_from_file(zero_capacity.path()).unwrap_err();
    let bucket_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<BucketError>())
        .expect("a BucketError in the chain");
    assert!(matches!(bucket_err, BucketError::InvalidConfiguration(_)));

    let missing_capacity = write_config("refill_interval_ms: 100\n")?;
    assert!(BucketConfig::load_from_file(missing_capacity.path()).is_err());
    Ok(())
}

#[test]
fn test_load_missing_file_reports_path() {
    let err = BucketConfig::load_from_file("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.yaml"));
}

#[test(tokio::test(start_paused = true))]
async fn test_bucket_from_config_uses_scaled_schedule() -> Result<()> {
    let config = BucketConfig::from_yaml_str("refill_interval_ms: 25\ncapacity: 1000\n")?;
    let bucket = TokenBucket::from_config(&config)?;

    assert_eq!(bucket.capacity(), 1000);
    assert_eq!(bucket.schedule().period, MIN_TICK_GRANULARITY);
    assert_eq!(bucket.schedule().increment, 2);

    assert!(bucket.acquire(1000).await?);
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(bucket.available_tokens().await?, 4);
    Ok(())
}
