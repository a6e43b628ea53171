use std::ops::{Add, Div, Mul, Sub};

use chrono::{DateTime, DurationRound, Local, TimeDelta};
use itertools::Itertools;

use crate::core::series::Series;

const ONE_MINUTE: TimeDelta = TimeDelta::minutes(1);

impl<T> Resample for T where T: ?Sized {}

pub trait Resample {
    /// Treat the samples as a step function (each value holds until the next sample)
    /// and average it over every minute between the first and the last sample.
    ///
    /// Minutes not covered by any step (a single sample, or the last sample on a minute boundary)
    /// take the value in effect at the minute start.
    fn forward_fill_minutely<V>(self) -> Series<V>
    where
        Self: Iterator<Item = (DateTime<Local>, V)> + Sized,
        V: Copy + Default + Add<Output = V> + Mul<f64, Output = V> + Div<f64, Output = V>,
    {
        let samples = self.sorted_by_key(|(timestamp, _)| *timestamp).collect_vec();
        let (Some(&(first, _)), Some(&(last, _))) = (samples.first(), samples.last()) else {
            return Vec::new();
        };

        let mut resampled = Vec::new();
        let mut minute = first.duration_trunc(ONE_MINUTE).unwrap_or(first);
        let mut index = 0;
        while minute <= last {
            let next_minute = minute + ONE_MINUTE;
            while index + 1 < samples.len() && samples[index + 1].0 <= minute {
                index += 1;
            }

            let mut integral = V::default();
            let mut covered = 0.0;
            for ((from, value), (to, _)) in samples[index..].iter().tuple_windows() {
                if *from >= next_minute {
                    break;
                }
                let seconds = (*to.min(&next_minute) - *from.max(&minute)).as_seconds_f64();
                if seconds > 0.0 {
                    integral = integral + *value * seconds;
                    covered += seconds;
                }
            }

            let value = if covered > 0.0 { integral / covered } else { samples[index].1 };
            resampled.push((minute, value));
            minute = next_minute;
        }
        resampled
    }

    /// Linearly interpolate the samples at every minute between the first and the last sample.
    fn interpolate_minutely<V>(self) -> Series<V>
    where
        Self: Iterator<Item = (DateTime<Local>, V)> + Sized,
        V: Copy + Add<Output = V> + Sub<Output = V> + Mul<f64, Output = V>,
    {
        let samples = self.sorted_by_key(|(timestamp, _)| *timestamp).collect_vec();
        let (Some(&(first, first_value)), Some(&(last, _))) = (samples.first(), samples.last())
        else {
            return Vec::new();
        };

        let mut resampled = Vec::new();
        let mut minute = first.duration_trunc(ONE_MINUTE).unwrap_or(first);
        let mut index = 0;
        while minute <= last {
            while index + 1 < samples.len() && samples[index + 1].0 <= minute {
                index += 1;
            }
            let (left, left_value) = samples[index];
            let value = if minute < left {
                first_value
            } else if let Some(&(right, right_value)) = samples.get(index + 1) {
                let fraction = (minute - left).as_seconds_f64() / (right - left).as_seconds_f64();
                left_value + (right_value - left_value) * fraction
            } else {
                left_value
            };
            resampled.push((minute, value));
            minute += ONE_MINUTE;
        }
        resampled
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, 11, hour, minute, second).unwrap()
    }

    #[test]
    fn test_forward_fill_minutely() {
        let series = vec![(at(10, 0, 0), 1.0), (at(10, 0, 30), 3.0), (at(10, 2, 0), 5.0)]
            .into_iter()
            .forward_fill_minutely();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].0, at(10, 0, 0));
        assert_abs_diff_eq!(series[0].1, 2.0);
        assert_abs_diff_eq!(series[1].1, 3.0);
        assert_eq!(series[2].0, at(10, 2, 0));
        assert_abs_diff_eq!(series[2].1, 5.0);
    }

    #[test]
    fn test_forward_fill_unaligned_start() {
        let series = vec![(at(10, 0, 30), 4.0), (at(10, 1, 30), 0.0)]
            .into_iter()
            .forward_fill_minutely();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, at(10, 0, 0));
        assert_abs_diff_eq!(series[0].1, 4.0);
        assert_abs_diff_eq!(series[1].1, 4.0);
    }

    #[test]
    fn test_forward_fill_empty() {
        let series = Vec::<(DateTime<Local>, f64)>::new().into_iter().forward_fill_minutely();
        assert!(series.is_empty());
    }

    #[test]
    fn test_interpolate_minutely() {
        let series = vec![(at(10, 0, 0), 0.0), (at(10, 30, 0), 3.0), (at(11, 0, 0), 0.0)]
            .into_iter()
            .interpolate_minutely();
        assert_eq!(series.len(), 61);
        assert_abs_diff_eq!(series[0].1, 0.0);
        assert_abs_diff_eq!(series[10].1, 1.0);
        assert_abs_diff_eq!(series[30].1, 3.0);
        assert_abs_diff_eq!(series[45].1, 1.5);
        assert_eq!(series[60].0, at(11, 0, 0));
        assert_abs_diff_eq!(series[60].1, 0.0);
    }
}
