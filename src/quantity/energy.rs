use std::ops::Div;

use chrono::TimeDelta;

use crate::quantity::power::Kilowatts;

quantity!(KilowattHours, "kWh");

impl Div<TimeDelta> for KilowattHours {
    type Output = Kilowatts;

    fn div(self, rhs: TimeDelta) -> Self::Output {
        let hours = rhs.as_seconds_f64() / 3600.0;
        Kilowatts(self.0 / hours)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_ordering() {
        assert!(KilowattHours(1.0) < KilowattHours(2.0));
        assert_eq!(KilowattHours(1.0).max(KilowattHours(-3.0)), KilowattHours(1.0));
        assert_eq!(
            KilowattHours(5.0).clamp(KilowattHours::ZERO, KilowattHours(4.0)),
            KilowattHours(4.0),
        );
    }

    #[test]
    fn test_div_time_delta() {
        let power = KilowattHours(0.5) / TimeDelta::minutes(30);
        assert_abs_diff_eq!(power.0, 1.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{:.2}", KilowattHours(1.234_5)), "1.23 kWh");
    }
}
