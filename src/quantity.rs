#[macro_use]
mod macros;

pub mod electric;
pub mod energy;
pub mod percent;
pub mod power;

/// Round to two decimal places, which is the precision all read surfaces report.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.235_1), 1.24);
        assert_eq!(round2(-0.004), -0.0);
    }

    #[test]
    fn test_round2_idempotent() {
        for value in [0.1, 0.29, 7.655, 9.0, 123.456_789] {
            assert_eq!(round2(round2(value)), round2(value));
        }
    }
}
