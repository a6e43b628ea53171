use std::ops::Mul;

use chrono::TimeDelta;

use crate::quantity::energy::KilowattHours;

quantity!(Kilowatts, "kW");

quantity!(Watts, "W");

impl Mul<TimeDelta> for Kilowatts {
    type Output = KilowattHours;

    fn mul(self, rhs: TimeDelta) -> Self::Output {
        let hours = rhs.as_seconds_f64() / 3600.0;
        KilowattHours(self.0 * hours)
    }
}

impl From<Watts> for Kilowatts {
    fn from(watts: Watts) -> Self {
        Self(watts.0 * 0.001)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_energy_per_minute() {
        let energy = Kilowatts(3.0) * TimeDelta::minutes(1);
        assert_abs_diff_eq!(energy.0, 0.05);
    }

    #[test]
    fn test_from_watts() {
        assert_abs_diff_eq!(Kilowatts::from(Watts(1500.0)).0, 1.5);
    }
}
