//! PWM numeric conversions.
//!
//! The kernel speaks integer nanoseconds; callers speak Hz and duty fractions.
//! Every conversion validates before returning so out-of-range values never
//! reach a device node.

use crate::consts::NS_PER_SEC;
use crate::hal::provider::HalError;

/// Reject duty fractions outside `[0, 1]` (NaN included).
pub fn check_duty(value: f32) -> Result<(), HalError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(HalError::InvalidArgument(format!(
            "duty {value} outside [0, 1]"
        )))
    }
}

/// Period in nanoseconds for `frequency_hz`.
///
/// # Errors
/// `HalError::InvalidArgument` for 0 Hz or frequencies above 1 GHz.
pub fn period_ns(frequency_hz: u32) -> Result<u64, HalError> {
    if frequency_hz == 0 || u64::from(frequency_hz) > NS_PER_SEC {
        return Err(HalError::InvalidArgument(format!(
            "frequency {frequency_hz} Hz outside 1..={NS_PER_SEC}"
        )));
    }
    Ok(NS_PER_SEC / u64::from(frequency_hz))
}

/// Frequency in Hz for a period in nanoseconds.
pub fn frequency_hz(period_ns: u64) -> u32 {
    if period_ns == 0 {
        return 0;
    }
    u32::try_from(NS_PER_SEC / period_ns).unwrap_or(u32::MAX)
}

/// Duty in nanoseconds: `round(fraction * period_ns)`, never above the period.
pub fn duty_ns(fraction: f32, period_ns: u64) -> u64 {
    let ns = (f64::from(fraction) * period_ns as f64).round() as u64;
    ns.min(period_ns)
}

/// Duty fraction for a duty/period pair.
pub fn duty_fraction(duty_ns: u64, period_ns: u64) -> f32 {
    if period_ns == 0 {
        return 0.0;
    }
    (duty_ns as f64 / period_ns as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_bounds() {
        assert!(check_duty(0.0).is_ok());
        assert!(check_duty(1.0).is_ok());
        assert!(check_duty(0.25).is_ok());
        assert!(matches!(check_duty(1.5), Err(HalError::InvalidArgument(_))));
        assert!(matches!(check_duty(-0.1), Err(HalError::InvalidArgument(_))));
        assert!(matches!(check_duty(f32::NAN), Err(HalError::InvalidArgument(_))));
    }

    #[test]
    fn period_conversion() {
        assert_eq!(period_ns(100).unwrap(), 10_000_000);
        assert_eq!(period_ns(50).unwrap(), 20_000_000);
        assert_eq!(period_ns(1_000_000_000).unwrap(), 1);
        assert!(period_ns(0).is_err());
        assert!(period_ns(u32::MAX).is_err());
    }

    #[test]
    fn frequency_round_trip() {
        assert_eq!(frequency_hz(10_000_000), 100);
        assert_eq!(frequency_hz(0), 0);
    }

    #[test]
    fn duty_rounding() {
        assert_eq!(duty_ns(0.5, 10_000_000), 5_000_000);
        assert_eq!(duty_ns(1.0, 10_000_000), 10_000_000);
        assert_eq!(duty_ns(0.0, 10_000_000), 0);
        // 1/3 of 10 ns rounds to 3
        assert_eq!(duty_ns(1.0 / 3.0, 10), 3);
        assert!((duty_fraction(5_000_000, 10_000_000) - 0.5).abs() < f32::EPSILON);
        assert_eq!(duty_fraction(5, 0), 0.0);
    }
}
