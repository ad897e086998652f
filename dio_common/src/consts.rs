//! System-wide constants for the dio workspace.
//!
//! Single source of truth for sysfs paths, timing defaults and numeric limits.

use static_assertions::const_assert;
use std::time::Duration;

/// Kernel sysfs GPIO class directory.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Kernel sysfs PWM class directory.
pub const SYSFS_PWM_ROOT: &str = "/sys/class/pwm";

/// Control file used to create a `gpio<N>` / `pwm<N>` node.
pub const EXPORT_FILE: &str = "export";

/// Control file used to destroy a `gpio<N>` / `pwm<N>` node.
pub const UNEXPORT_FILE: &str = "unexport";

/// GPIO direction attribute (`in` / `out`).
pub const DIRECTION_FILE: &str = "direction";

/// GPIO value attribute (`0` / `1`).
pub const VALUE_FILE: &str = "value";

/// GPIO interrupt edge attribute.
pub const EDGE_FILE: &str = "edge";

/// PWM polarity attribute (`normal` / `inversed`).
pub const POLARITY_FILE: &str = "polarity";

/// PWM period attribute, decimal nanoseconds.
pub const PERIOD_FILE: &str = "period";

/// PWM duty cycle attribute, decimal nanoseconds.
pub const DUTY_CYCLE_FILE: &str = "duty_cycle";

/// PWM enable attribute (`0` / `1`).
pub const ENABLE_FILE: &str = "enable";

/// Sleep granularity while waiting for an exported node to appear.
pub const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on the wait for an exported node to appear.
pub const EXPORT_TIMEOUT: Duration = Duration::from_millis(500);

/// Frequency used when a PWM output is provisioned without an explicit one.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 100;

/// Nanoseconds per second, the numerator of every period conversion.
pub const NS_PER_SEC: u64 = 1_000_000_000;

/// Default worker count kept warm by the background blink pool.
pub const DEFAULT_BLINK_POOL_THREADS: usize = 2;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dio/hal.toml";

/// Default provider name.
pub const DEFAULT_PROVIDER: &str = "sysfs";

const_assert!(EXPORT_POLL_INTERVAL.as_nanos() < EXPORT_TIMEOUT.as_nanos());
const_assert!(DEFAULT_PWM_FREQUENCY_HZ as u64 <= NS_PER_SEC);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(DEFAULT_PWM_FREQUENCY_HZ > 0);
        assert!(DEFAULT_BLINK_POOL_THREADS > 0);
    }

    #[test]
    fn sysfs_roots_are_absolute() {
        assert!(SYSFS_GPIO_ROOT.starts_with('/'));
        assert!(SYSFS_PWM_ROOT.starts_with('/'));
    }
}
