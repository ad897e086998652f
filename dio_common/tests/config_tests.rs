//! Config loading tests.
//!
//! Loads a complete `hal.toml` with a board pin catalog from a temp
//! directory and checks defaults, catalog construction and validation.

use dio_common::config::{ConfigError, ConfigLoader, HalConfig};
use dio_common::hal::pin::{DeviceMode, PwmChannel};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write a Raspberry Pi style catalog with two hardware PWM pins.
fn write_board_toml(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("hal.toml");
    fs::write(
        &path,
        r#"
log_level = "info"
provider = "sysfs"

[sysfs]
export_poll_interval_ms = 5
export_timeout_ms = 250

[[pins]]
gpio = 17
name = "GPIO17"
modes = ["digital_input", "digital_output"]

[[pins]]
gpio = 18
name = "GPIO18"
modes = ["digital_input", "digital_output", "pwm_output"]
pwm = { chip = 0, channel = 0 }

[[pins]]
gpio = 19
name = "GPIO19"
modes = ["digital_input", "digital_output", "pwm_output"]
pwm = { chip = 0, channel = 1 }

[[pins]]
gpio = 26
name = "GPIO26"
modes = ["digital_input"]
"#,
    )
    .unwrap();
    path
}

#[test]
fn board_catalog_loads() {
    let tmp = TempDir::new().unwrap();
    let path = write_board_toml(tmp.path());

    let config = HalConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.sysfs.export_timeout_ms, 250);

    let catalog = config.catalog().unwrap();
    assert_eq!(catalog.len(), 4);

    let gpio18 = catalog.by_gpio(18).unwrap();
    assert_eq!(gpio18.pwm, Some(PwmChannel { chip: 0, channel: 0 }));
    assert!(gpio18.supports(DeviceMode::PwmOutput));
    assert!(gpio18.supports(DeviceMode::DigitalOutput));

    let gpio17 = catalog.by_gpio(17).unwrap();
    assert!(!gpio17.supports(DeviceMode::PwmOutput));

    let gpio26 = catalog.by_gpio(26).unwrap();
    assert!(gpio26.supports(DeviceMode::DigitalInput));
    assert!(!gpio26.supports(DeviceMode::DigitalOutput));
    assert!(gpio26.require(DeviceMode::DigitalOutput).is_err());
}

#[test]
fn duplicate_pwm_channel_fails_validation() {
    let config = HalConfig::from_toml(
        r#"
[[pins]]
gpio = 12
modes = ["digital_output"]
pwm = { chip = 0, channel = 0 }

[[pins]]
gpio = 18
modes = ["digital_output"]
pwm = { chip = 0, channel = 0 }
"#,
    )
    .unwrap();
    match config.validate() {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("pwmchip0/pwm0")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn unknown_provider_field_type_is_parse_error() {
    let result = HalConfig::from_toml("provider = 5");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}
