//! Solar production forecast.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, DurationRound, Local, NaiveDate, NaiveTime, TimeDelta};

use crate::{
    api::forecast_provider::{ApiUsage, ForecastProvider, ForecastSample},
    core::{
        series::{Point, Resample, Series},
        window::at,
    },
    error::NoData,
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilowatts},
};

const ONE_MINUTE: TimeDelta = TimeDelta::minutes(1);

/// Minute-by-minute solar production from the estimated actuals through the forecast horizon.
#[derive(Default)]
pub struct ForecastModel {
    raw: Vec<ForecastSample>,
    frame: Option<Series<KilowattHours>>,
}

impl ForecastModel {
    #[must_use]
    pub const fn ready(&self) -> bool {
        self.frame.is_some()
    }

    /// Replace the raw samples, for example with the cached ones.
    pub fn load(&mut self, raw: Vec<ForecastSample>) -> Result<(), NoData> {
        let frame = resample(&raw)?;
        self.raw = raw;
        self.frame = Some(frame);
        Ok(())
    }

    /// Fetch the samples of all the sites.
    ///
    /// The model is left intact on failure.
    #[instrument(skip_all)]
    pub async fn refresh(&mut self, provider: &dyn ForecastProvider) -> Result {
        info!("refreshing the forecast…");
        let mut raw = Vec::new();
        for site in provider.get_sites().await? {
            raw.extend(provider.get_samples(&site).await?);
        }
        self.load(raw)?;
        info!(n_samples = self.raw.len(), "refreshed the forecast");
        Ok(())
    }

    pub fn raw_data(&self) -> Result<&[ForecastSample], NoData> {
        if self.raw.is_empty() { Err(NoData("no forecast data available")) } else { Ok(&self.raw) }
    }

    pub fn frame(&self) -> Result<&[Point<KilowattHours>], NoData> {
        self.frame.as_deref().ok_or(NoData("no forecast data available"))
    }

    fn total_on(
        &self,
        date: NaiveDate,
        since: Option<DateTime<Local>>,
    ) -> Result<KilowattHours, NoData> {
        let total: KilowattHours = self
            .frame()?
            .iter()
            .filter(|(timestamp, _)| timestamp.date_naive() == date)
            .filter(|(timestamp, _)| since.is_none_or(|since| *timestamp >= since))
            .map(|(_, energy)| *energy)
            .sum();
        Ok(total.round2())
    }

    pub fn total_kwh_forecast_today(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.total_on(now.date_naive(), None)
    }

    pub fn total_kwh_forecast_tomorrow(
        &self,
        now: DateTime<Local>,
    ) -> Result<KilowattHours, NoData> {
        let tomorrow = now.date_naive().checked_add_days(Days::new(1)).unwrap_or(now.date_naive());
        self.total_on(tomorrow, None)
    }

    /// Production over the rest of today.
    pub fn total_kwh_forecast_today_remaining(
        &self,
        now: DateTime<Local>,
    ) -> Result<KilowattHours, NoData> {
        self.total_on(now.date_naive(), Some(now))
    }
}

/// Sum the overlapping sites, interpolate linearly and convert into energy per minute.
fn resample(raw: &[ForecastSample]) -> Result<Series<KilowattHours>, NoData> {
    let mut by_period: BTreeMap<DateTime<Local>, Kilowatts> = BTreeMap::new();
    for sample in raw {
        *by_period.entry(sample.period_start).or_default() += sample.pv_estimate;
    }
    let frame: Series<KilowattHours> = by_period
        .into_iter()
        .interpolate_minutely()
        .into_iter()
        .map(|(timestamp, power)| (timestamp, power * ONE_MINUTE))
        .collect();
    if frame.is_empty() { Err(NoData("no forecast data available")) } else { Ok(frame) }
}

/// Statically valid.
const DEFAULT_REFRESH_TIME: NaiveTime = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
const REFRESH_SPAN: TimeDelta = TimeDelta::hours(12);
const CALLS_PER_REFRESH: i64 = 2;
const RESERVED_CALLS: i64 = CALLS_PER_REFRESH * 2;

/// Plan the forecast refreshes for the rest of the day within the provider quota.
///
/// The default morning refresh always happens. The remaining quota is spread evenly
/// between now (or the morning refresh, whichever is later) and the end of the refresh span.
#[must_use]
pub fn refresh_times(now: DateTime<Local>, usage: ApiUsage, n_sites: usize) -> Vec<NaiveTime> {
    let default_start = at(now.date_naive(), DEFAULT_REFRESH_TIME);
    let default_end = default_start + REFRESH_SPAN;
    let actual_start = now.max(default_start);

    let mut times = vec![DEFAULT_REFRESH_TIME];

    let n_sites = i64::try_from(n_sites.max(1)).unwrap_or(i64::MAX);
    let n_left = i64::from(usage.daily_limit) - i64::from(usage.consumed) - RESERVED_CALLS;
    let mut n_available = n_left / (CALLS_PER_REFRESH * n_sites);
    if now < default_start {
        // The default refresh is still ahead and takes its share of the quota.
        n_available -= 1;
    }
    if n_available < 1 || now > default_end {
        debug!(n_available, "no extra forecast refreshes");
        return times;
    }

    let interval = (default_end - actual_start).num_minutes() / n_available;
    for i in 1..=n_available {
        let refresh_at = actual_start + TimeDelta::minutes(interval * i);
        times.push(refresh_at.duration_trunc(ONE_MINUTE).unwrap_or(refresh_at).time());
    }
    debug!(?times, "planned the forecast refreshes");
    times
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, day, hour, minute, 0).unwrap()
    }

    fn sample(day: u32, hour: u32, minute: u32, pv_estimate: f64) -> ForecastSample {
        let period_start = at(day, hour, minute);
        ForecastSample {
            period_start,
            period_end: period_start + TimeDelta::minutes(30),
            pv_estimate: Kilowatts(pv_estimate),
        }
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_not_ready() {
        let model = ForecastModel::default();
        assert!(!model.ready());
        assert!(model.frame().is_err());
        assert!(model.raw_data().is_err());
        assert!(model.total_kwh_forecast_today(at(11, 12, 0)).is_err());
    }

    #[test]
    fn test_load_empty_is_no_data() {
        let mut model = ForecastModel::default();
        assert!(model.load(Vec::new()).is_err());
        assert!(!model.ready());
    }

    #[test]
    fn test_resample_sums_sites_and_interpolates() -> Result {
        let mut model = ForecastModel::default();
        model.load(vec![
            sample(11, 10, 0, 1.0),
            sample(11, 10, 0, 2.0),
            sample(11, 10, 30, 6.0),
        ])?;
        let frame = model.frame()?;
        assert_eq!(frame.len(), 31);
        assert_abs_diff_eq!(frame[0].1.0, 3.0 / 60.0, epsilon = 1e-12);
        assert_abs_diff_eq!(frame[15].1.0, 4.5 / 60.0, epsilon = 1e-12);
        assert_abs_diff_eq!(frame[30].1.0, 6.0 / 60.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_totals() -> Result {
        let mut model = ForecastModel::default();
        model.load(vec![
            sample(11, 10, 0, 6.0),
            sample(11, 11, 0, 6.0),
            sample(11, 11, 30, 0.0),
            sample(12, 9, 30, 0.0),
            sample(12, 10, 0, 3.0),
            sample(12, 11, 0, 3.0),
            sample(12, 11, 30, 0.0),
        ])?;
        let now = at(11, 10, 30);
        assert_abs_diff_eq!(model.total_kwh_forecast_today(now)?.0, 7.55);
        assert_abs_diff_eq!(model.total_kwh_forecast_today_remaining(now)?.0, 4.55);
        assert_abs_diff_eq!(model.total_kwh_forecast_tomorrow(now)?.0, 4.5);
        Ok(())
    }

    #[test]
    fn test_refresh_times_before_default_start() {
        let usage = ApiUsage { consumed: 0, daily_limit: 10 };
        let times = refresh_times(at(11, 5, 0), usage, 1);
        // (10 - 0 - 4) / 2 = 3, minus the default one:
        assert_eq!(times, [time(6, 0), time(12, 0), time(18, 0)]);
    }

    #[test]
    fn test_refresh_times_during_the_day() {
        let usage = ApiUsage { consumed: 4, daily_limit: 50 };
        let times = refresh_times(at(11, 14, 0), usage, 2);
        // (50 - 4 - 4) / 4 = 10 refreshes over the 4 remaining hours:
        assert_eq!(times.len(), 11);
        assert_eq!(times[1], time(14, 24));
        assert_eq!(times[10], time(18, 0));
    }

    #[test]
    fn test_refresh_times_exhausted() {
        let usage = ApiUsage { consumed: 10, daily_limit: 10 };
        assert_eq!(refresh_times(at(11, 12, 0), usage, 1), [time(6, 0)]);
        let usage = ApiUsage::default();
        assert_eq!(refresh_times(at(11, 19, 0), usage, 1), [time(6, 0)]);
    }
}
