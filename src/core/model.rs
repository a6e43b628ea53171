//! Battery simulation over the merged load and forecast.
//!
//! The model walks the future minutes one by one:
//!
//! - at an off-peak window start, the battery receives the charge required to get through the
//!   following day, and the required floor is remembered;
//! - inside the window the battery is held at the floor;
//! - otherwise the battery absorbs the production surplus or covers the deficit,
//!   and anything beyond its bounds flows to or from the grid.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{
    api::state_of_charge::StateOfChargeSensor,
    core::{
        battery::BatteryUtils,
        schedule::{Schedule, ScheduleEntry},
        series::{AverageByTimeOfDay, Point},
        window::{EcoWindow, at},
    },
    error::NoData,
    prelude::*,
    quantity::energy::KilowattHours,
};

/// Statically valid.
const NOON: NaiveTime = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

/// Past rows kept across refreshes.
const HISTORY_RETENTION: TimeDelta = TimeDelta::days(3);

/// Single simulated minute.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub period_start: DateTime<Local>,

    /// Average house load at this time of day.
    pub load: KilowattHours,

    pub pv_estimate: KilowattHours,

    /// Production minus load.
    pub delta: KilowattHours,

    /// Usable energy above the reserve, `None` for rows that were never simulated.
    #[serde(default)]
    pub battery: Option<KilowattHours>,

    /// Negative is import, positive is export.
    #[serde(default)]
    pub grid: Option<KilowattHours>,
}

impl Period {
    pub fn new(
        period_start: DateTime<Local>,
        load: KilowattHours,
        pv_estimate: KilowattHours,
    ) -> Self {
        let delta = pv_estimate - load;
        Self { period_start, load, pv_estimate, delta, battery: None, grid: None }
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.period_start.date_naive()
    }
}

/// Outcome of the charge computation for a window occurrence.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChargeTotals {
    /// Energy to add at the window start.
    pub total: KilowattHours,

    /// Floor to hold during the window.
    pub min_soc: KilowattHours,
}

#[must_use]
#[derive(bon::Builder)]
pub struct BatteryModel {
    window: EcoWindow,
    battery: BatteryUtils,
    dawn_buffer: KilowattHours,
    day_buffer: KilowattHours,

    #[builder(skip)]
    rows: Vec<Period>,

    #[builder(skip)]
    ready: bool,
}

impl BatteryModel {
    #[must_use]
    pub const fn ready(&self) -> bool {
        self.ready
    }

    /// Simulated history and projection, ordered by time.
    #[must_use]
    pub fn rows(&self) -> &[Period] {
        &self.rows
    }

    /// Restore the rows persisted by an earlier run, so that their history survives.
    ///
    /// The model only becomes ready after a refresh.
    pub fn restore(&mut self, rows: Vec<Period>) {
        self.rows = rows;
    }

    /// Re-run the simulation from now on and update the schedule.
    ///
    /// Nothing is changed on failure.
    #[instrument(skip_all, fields(now = %now))]
    pub fn refresh(
        &mut self,
        forecast: &[Point<KilowattHours>],
        load: &[Point<KilowattHours>],
        state_of_charge: &dyn StateOfChargeSensor,
        schedule: &mut Schedule,
        now: DateTime<Local>,
    ) -> Result<(), NoData> {
        let merged = merge(forecast, load);
        let battery_now = self.battery_now(state_of_charge)?;
        let mut staged = schedule.clone();

        let last_start = self.window.last_start(now);
        let mut min_soc = match staged.get(last_start).and_then(|entry| entry.min_soc) {
            Some(min_soc) => min_soc,
            None if self.window.contains(now.time()) => {
                // Recalculate without knowing the boost.
                let boost = KilowattHours::ZERO;
                self.charge_totals(&merged, last_start, battery_now, boost, &mut staged).min_soc
            }
            None => KilowattHours::ZERO,
        };
        debug!(%battery_now, %min_soc, "starting the simulation…");

        let available = self.battery.available_capacity();
        let mut battery = battery_now;
        let mut starts = Vec::new();
        let mut future = Vec::with_capacity(merged.len());

        for row in merged.iter().filter(|row| row.period_start > now) {
            let time = row.period_start.time();
            let grid = if time == self.window.start() {
                let start = row.period_start;
                let boost = staged.get(start).map(ScheduleEntry::boost).unwrap_or_default();
                let totals = self.charge_totals(&merged, start, battery, boost, &mut staged);
                battery += totals.total;
                min_soc = totals.min_soc;
                starts.push(start);
                KilowattHours::ZERO
            } else if self.window.contains(time) && battery < min_soc {
                // The inverter holds the floor.
                battery = min_soc;
                KilowattHours::ZERO
            } else {
                let projected = battery + row.delta;
                battery = projected.clamp(KilowattHours::ZERO, available);
                projected - battery
            };
            future.push(Period { battery: Some(battery), grid: Some(grid), ..*row });
        }

        for start in starts {
            let day = self.window.following_day(start);
            let (import, export) = future
                .iter()
                .filter(|row| day.surrounds(row.period_start))
                .filter_map(|row| row.grid)
                .fold((KilowattHours::ZERO, KilowattHours::ZERO), |(import, export), grid| {
                    if grid < KilowattHours::ZERO {
                        (import + grid, export)
                    } else {
                        (import, export + grid)
                    }
                });
            let entry = ScheduleEntry::builder().import(import.abs()).export(export).build();
            staged.upsert(start, entry);
        }

        let history_source = if self.rows.is_empty() { &merged } else { &self.rows };
        let mut rows: Vec<Period> = history_source
            .iter()
            .filter(|row| now - HISTORY_RETENTION < row.period_start && row.period_start <= now)
            .copied()
            .collect();
        let n_history = rows.len();
        rows.extend(future);
        info!(n_history, n_rows = rows.len(), "simulated");

        self.rows = rows;
        self.ready = true;
        *schedule = staged;
        Ok(())
    }

    /// Usable energy right now, within the battery bounds.
    fn battery_now(
        &self,
        state_of_charge: &dyn StateOfChargeSensor,
    ) -> Result<KilowattHours, NoData> {
        let state_of_charge = state_of_charge
            .state_of_charge()
            .ok_or(NoData("battery state-of-charge is unavailable"))?;
        let available = self.battery.available_capacity();
        Ok(self.battery.percent_to_charge(state_of_charge).clamp(KilowattHours::ZERO, available))
    }

    /// Compute the charge needed at the window occurrence starting at `start`
    /// and record it in the schedule.
    ///
    /// The dawn charge covers the deficit from the window end until solar production
    /// exceeds the load. The day charge covers the deficit of the whole following day.
    #[instrument(skip_all, fields(start = %start, battery = %battery, boost = %boost))]
    pub fn charge_totals(
        &self,
        rows: &[Period],
        start: DateTime<Local>,
        battery: KilowattHours,
        boost: KilowattHours,
        schedule: &mut Schedule,
    ) -> ChargeTotals {
        let day = self.window.following_day(start);
        let (forecast, load) = rows
            .iter()
            .filter(|row| day.surrounds(row.period_start))
            .fold((KilowattHours::ZERO, KilowattHours::ZERO), |(forecast, load), row| {
                (forecast + row.pv_estimate, load + row.load)
            });

        let dawn_time = dawn_time(rows, day.start.date_naive());
        let dawn_load: KilowattHours = rows
            .iter()
            .filter(|row| day.start < row.period_start && row.period_start < dawn_time)
            .map(|row| row.delta)
            .sum();
        let dawn_load = dawn_load.abs().round2();

        let dawn = self.battery.ceiling((dawn_load + self.dawn_buffer).max(KilowattHours::ZERO));
        let day_deficit = (load - forecast + self.day_buffer).max(KilowattHours::ZERO);
        let day_charge = self.battery.ceiling(day_deficit);
        let max_charge = dawn.max(day_charge);
        let min_soc = if boost == KilowattHours::ZERO {
            max_charge
        } else {
            self.battery.ceiling(battery.max(max_charge) + boost)
        };
        let total = self.battery.ceiling((min_soc - battery).max(KilowattHours::ZERO));
        debug!(%dawn_time, %dawn, day = %day_charge, %total, %min_soc, "charge totals");

        schedule.upsert(
            start,
            ScheduleEntry::builder()
                .eco_start(start)
                .eco_end(day.start)
                .battery(battery)
                .load(load)
                .forecast(forecast)
                .dawn(dawn)
                .day(day_charge)
                .total(total)
                .min_soc(min_soc)
                .build(),
        );
        ChargeTotals { total, min_soc }
    }

    fn ensure_ready(&self) -> Result<(), NoData> {
        if self.ready {
            Ok(())
        } else {
            Err(NoData("the battery model has not been refreshed yet"))
        }
    }

    fn next_entry<'a>(
        &self,
        schedule: &'a Schedule,
        now: DateTime<Local>,
    ) -> Result<&'a ScheduleEntry, NoData> {
        self.ensure_ready()?;
        schedule.get(self.window.next_start(now)).ok_or(NoData("no schedule for the next window"))
    }

    fn next_field(
        &self,
        schedule: &Schedule,
        now: DateTime<Local>,
        field: fn(&ScheduleEntry) -> Option<KilowattHours>,
    ) -> Result<KilowattHours, NoData> {
        field(self.next_entry(schedule, now)?)
            .map(KilowattHours::round2)
            .ok_or(NoData("the next window has not been computed"))
    }

    /// Battery energy right before the next window start.
    pub fn state_at_eco_start(
        &self,
        schedule: &Schedule,
        now: DateTime<Local>,
    ) -> Result<KilowattHours, NoData> {
        self.next_field(schedule, now, |entry| entry.battery)
    }

    pub fn dawn_charge(
        &self,
        schedule: &Schedule,
        now: DateTime<Local>,
    ) -> Result<KilowattHours, NoData> {
        self.next_field(schedule, now, |entry| entry.dawn)
    }

    pub fn day_charge(
        &self,
        schedule: &Schedule,
        now: DateTime<Local>,
    ) -> Result<KilowattHours, NoData> {
        self.next_field(schedule, now, |entry| entry.day)
    }

    pub fn total_charge(
        &self,
        schedule: &Schedule,
        now: DateTime<Local>,
    ) -> Result<KilowattHours, NoData> {
        self.next_field(schedule, now, |entry| entry.total)
    }

    pub fn min_soc(
        &self,
        schedule: &Schedule,
        now: DateTime<Local>,
    ) -> Result<KilowattHours, NoData> {
        self.next_field(schedule, now, |entry| entry.min_soc)
    }

    /// First future minute with the battery empty.
    ///
    /// Returns `None` when the battery is already empty, and the last simulated minute
    /// when the battery lasts longer than the projection.
    pub fn battery_depleted_time(
        &self,
        state_of_charge: &dyn StateOfChargeSensor,
        now: DateTime<Local>,
    ) -> Result<Option<DateTime<Local>>, NoData> {
        self.ensure_ready()?;
        if self.battery_now(state_of_charge)? <= KilowattHours::ZERO {
            return Ok(None);
        }
        let depleted_at = self
            .rows
            .iter()
            .find(|row| row.period_start > now && row.battery == Some(KilowattHours::ZERO))
            .or_else(|| self.rows.last())
            .map(|row| row.period_start);
        Ok(depleted_at)
    }

    fn grid_until_next_start(
        &self,
        now: DateTime<Local>,
    ) -> Result<impl Iterator<Item = KilowattHours>, NoData> {
        self.ensure_ready()?;
        let next_start = self.window.next_start(now);
        Ok(self
            .rows
            .iter()
            .filter(move |row| now < row.period_start && row.period_start < next_start)
            .filter_map(|row| row.grid))
    }

    /// Grid import until the next window start.
    pub fn peak_grid_import(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        let import: KilowattHours =
            self.grid_until_next_start(now)?.filter(|grid| *grid < KilowattHours::ZERO).sum();
        Ok(import.abs().round2())
    }

    /// Grid export until the next window start.
    pub fn peak_grid_export(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        let export: KilowattHours =
            self.grid_until_next_start(now)?.filter(|grid| *grid > KilowattHours::ZERO).sum();
        Ok(export.round2())
    }

    /// Today's dawn if it is still ahead, otherwise tomorrow's.
    pub fn next_dawn_time(&self, now: DateTime<Local>) -> Result<DateTime<Local>, NoData> {
        let today = self.todays_dawn_time(now)?;
        if now > today {
            let tomorrow =
                now.date_naive().checked_add_days(Days::new(1)).unwrap_or(now.date_naive());
            Ok(dawn_time(&self.rows, tomorrow))
        } else {
            Ok(today)
        }
    }

    pub fn todays_dawn_time(&self, now: DateTime<Local>) -> Result<DateTime<Local>, NoData> {
        self.ensure_ready()?;
        Ok(dawn_time(&self.rows, now.date_naive()))
    }
}

/// Join the average load by time of day onto the forecast timestamps.
///
/// Minutes without any load history are assumed to have no load.
fn merge(forecast: &[Point<KilowattHours>], load: &[Point<KilowattHours>]) -> Vec<Period> {
    let average_load = load.iter().copied().average_by_time_of_day();
    forecast
        .iter()
        .map(|(period_start, pv_estimate)| {
            let load = average_load.get(&period_start.time()).copied().unwrap_or_default();
            Period::new(*period_start, load, *pv_estimate)
        })
        .collect()
}

/// First minute of the day when the production exceeds a non-zero load, or noon if it never does.
fn dawn_time(rows: &[Period], date: NaiveDate) -> DateTime<Local> {
    rows.iter()
        .find(|row| {
            row.date() == date && row.delta > KilowattHours::ZERO && row.load > KilowattHours::ZERO
        })
        .map_or_else(|| at(date, NOON), |row| row.period_start)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    use super::*;
    use crate::quantity::percent::Percent;

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, day, hour, minute, 0).unwrap()
    }

    fn battery() -> BatteryUtils {
        BatteryUtils::try_new(KilowattHours(10.0), Percent(10.0)).unwrap()
    }

    fn model(start: NaiveTime, end: NaiveTime) -> BatteryModel {
        BatteryModel::builder()
            .window(EcoWindow::try_new(start, end).unwrap())
            .battery(battery())
            .dawn_buffer(KilowattHours(1.0))
            .day_buffer(KilowattHours(2.0))
            .build()
    }

    /// Minute-by-minute series over `from..to`.
    fn frame(
        from: DateTime<Local>,
        to: DateTime<Local>,
        value: impl Fn(NaiveTime) -> f64,
    ) -> Vec<Point<KilowattHours>> {
        let mut frame = Vec::new();
        let mut timestamp = from;
        while timestamp < to {
            frame.push((timestamp, KilowattHours(value(timestamp.time()))));
            timestamp += TimeDelta::minutes(1);
        }
        frame
    }

    /// Two days of load history and a forecast from yesterday until the day after tomorrow.
    fn frames(
        now: DateTime<Local>,
        load: impl Fn(NaiveTime) -> f64,
        pv: impl Fn(NaiveTime) -> f64,
    ) -> (Vec<Point<KilowattHours>>, Vec<Point<KilowattHours>>) {
        let forecast = frame(now - TimeDelta::days(1), now + TimeDelta::days(2), pv);
        let load = frame(now - TimeDelta::days(2), now, load);
        (forecast, load)
    }

    fn sunny(time: NaiveTime) -> f64 {
        if (self::time(7, 0)..self::time(19, 0)).contains(&time) { 0.05 } else { 0.0 }
    }

    fn assert_bounded(model: &BatteryModel, now: DateTime<Local>) {
        let available = battery().available_capacity();
        for row in model.rows().iter().filter(|row| row.period_start > now) {
            let battery = row.battery.unwrap();
            let grid = row.grid.unwrap();
            assert!(KilowattHours::ZERO <= battery && battery <= available, "{row:?}");
            if grid != KilowattHours::ZERO {
                assert!(battery == KilowattHours::ZERO || battery == available, "{row:?}");
            }
        }
    }

    #[test]
    fn test_flat_load_without_solar() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.5, |_| 0.0);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent(50.0), &mut schedule, now)?;
        assert!(model.ready());

        let dawn = model.dawn_charge(&schedule, now)?;
        let day = model.day_charge(&schedule, now)?;
        let total = model.total_charge(&schedule, now)?;
        assert!(dawn > KilowattHours::ZERO);
        assert!(day > KilowattHours::ZERO);
        assert_eq!(total, dawn.max(day));
        assert_eq!(model.min_soc(&schedule, now)?, battery().ceiling(total));
        assert_eq!(model.state_at_eco_start(&schedule, now)?, KilowattHours::ZERO);

        assert_bounded(&model, now);
        assert_abs_diff_eq!(model.peak_grid_export(now)?.0, 0.0);
        assert!(model.peak_grid_import(now)? > KilowattHours::ZERO);
        assert_eq!(model.todays_dawn_time(now)?, at(11, 12, 0), "solar never exceeds the load");
        Ok(())
    }

    #[test]
    fn test_full_battery_and_sunny_day() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.01, sunny);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent::HUNDRED, &mut schedule, now)?;

        assert_eq!(model.total_charge(&schedule, now)?, KilowattHours::ZERO);
        assert!(model.peak_grid_export(now)? > KilowattHours::ZERO);
        assert_abs_diff_eq!(model.peak_grid_import(now)?.0, 0.0);
        assert_bounded(&model, now);

        let entry = schedule.get(at(12, 0, 30)).unwrap();
        assert_eq!(entry.eco_start, Some(at(12, 0, 30)));
        assert_eq!(entry.eco_end, Some(at(12, 4, 30)));
        // From 04:30 till 07:00, exclusive:
        assert_abs_diff_eq!(entry.dawn.unwrap().0, 1.49 + 1.0, epsilon = 1e-9);
        assert_eq!(entry.day, Some(KilowattHours::ZERO));
        assert!(entry.export.unwrap() > KilowattHours::ZERO);

        assert_eq!(model.todays_dawn_time(now)?, at(11, 7, 0));
        assert_eq!(model.next_dawn_time(now)?, at(12, 7, 0));
        Ok(())
    }

    #[test]
    fn test_state_of_charge_below_reserve() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.0, |_| 0.0);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent(5.0), &mut schedule, now)?;

        for row in model.rows().iter().filter(|row| row.period_start > now) {
            if row.period_start < at(12, 0, 30) {
                assert_eq!(row.battery, Some(KilowattHours::ZERO), "{row:?}");
            }
            assert_eq!(row.grid, Some(KilowattHours::ZERO), "{row:?}");
        }
        assert_abs_diff_eq!(model.peak_grid_import(now)?.0, 0.0);
        assert_eq!(model.state_at_eco_start(&schedule, now)?, KilowattHours::ZERO);
        Ok(())
    }

    #[test]
    fn test_full_state_of_charge_stays_within_capacity() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.0, sunny);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent::HUNDRED, &mut schedule, now)?;

        let available = battery().available_capacity();
        let future = model.rows().iter().filter(|row| row.period_start > now);
        for row in future {
            assert!(row.battery.unwrap() <= available, "{row:?}");
        }
        assert_eq!(model.state_at_eco_start(&schedule, now)?, available);
        assert_bounded(&model, now);
        Ok(())
    }

    #[test]
    fn test_unavailable_state_of_charge() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.01, sunny);
        let mut schedule = Schedule::default();

        assert!(model.refresh(&forecast, &load, &None::<Percent>, &mut schedule, now).is_err());
        assert!(!model.ready());
        assert!(model.rows().is_empty());
        assert!(schedule.is_empty());
        assert!(model.total_charge(&schedule, now).is_err());

        model.refresh(&forecast, &load, &Some(Percent(60.0)), &mut schedule, now)?;
        let rows = model.rows().to_vec();
        let entries = schedule.clone();
        let later = now + TimeDelta::minutes(5);
        assert!(model.refresh(&forecast, &load, &None::<Percent>, &mut schedule, later).is_err());
        assert!(model.ready());
        assert_eq!(model.rows(), rows);
        assert_eq!(schedule, entries);
        Ok(())
    }

    #[test]
    fn test_full_override() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.01, sunny);
        let mut schedule = Schedule::default();
        schedule.upsert(
            at(12, 0, 30),
            ScheduleEntry::builder().full_status(battery().capacity()).build(),
        );
        model.refresh(&forecast, &load, &Percent::HUNDRED, &mut schedule, now)?;

        let entry = schedule.get(at(12, 0, 30)).unwrap();
        let battery_at_start = entry.battery.unwrap();
        assert_eq!(entry.min_soc, Some(battery().ceiling(battery_at_start + battery().capacity())));
        assert_eq!(entry.min_soc, Some(battery().available_capacity()));
        let expected_total = battery().ceiling(battery().available_capacity() - battery_at_start);
        assert_eq!(entry.total, Some(expected_total));
        assert_eq!(entry.full_status, Some(battery().capacity()), "the override is kept");
        Ok(())
    }

    #[test]
    fn test_boost_on_top_of_battery() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.01, sunny);
        let mut schedule = Schedule::default();
        let boost = ScheduleEntry::builder().boost_status(KilowattHours(1.0)).build();
        schedule.upsert(at(12, 0, 30), boost);
        model.refresh(&forecast, &load, &Percent::HUNDRED, &mut schedule, now)?;

        let entry = schedule.get(at(12, 0, 30)).unwrap();
        let battery_at_start = entry.battery.unwrap();
        let max_charge = entry.dawn.unwrap().max(entry.day.unwrap());
        assert_eq!(
            entry.min_soc,
            Some(battery().ceiling(battery_at_start.max(max_charge) + KilowattHours(1.0))),
        );
        assert!(entry.total.unwrap() > KilowattHours::ZERO);
        Ok(())
    }

    #[test]
    fn test_window_over_midnight_holds_floor() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(23, 0), time(5, 0));
        let (forecast, load) = frames(now, |_| 0.01, |_| 0.0);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent(50.0), &mut schedule, now)?;

        let entry = schedule.get(at(11, 23, 0)).unwrap();
        assert_eq!(entry.eco_end, Some(at(12, 5, 0)));
        let min_soc = entry.min_soc.unwrap();
        assert!(min_soc > KilowattHours::ZERO);

        let in_window: Vec<_> = model
            .rows()
            .iter()
            .filter(|row| at(11, 23, 0) < row.period_start && row.period_start <= at(12, 5, 0))
            .collect();
        assert_eq!(in_window.len(), 360);
        for row in in_window {
            let floor = min_soc - KilowattHours(0.01) - KilowattHours(1e-9);
            assert!(row.battery.unwrap() >= floor, "{row:?}");
            assert_eq!(row.grid, Some(KilowattHours::ZERO));
        }
        assert_bounded(&model, now);
        Ok(())
    }

    #[test]
    fn test_floor_reused_inside_window() -> Result {
        let now = at(12, 1, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.01, |_| 0.0);
        let mut schedule = Schedule::default();
        let floor = ScheduleEntry::builder().min_soc(KilowattHours(5.0)).build();
        schedule.upsert(at(12, 0, 30), floor);
        model.refresh(&forecast, &load, &Percent(20.0), &mut schedule, now)?;

        let held = model.rows().iter().find(|row| row.period_start == at(12, 1, 1)).unwrap();
        assert_eq!(held.battery, Some(KilowattHours(5.0)));
        assert_eq!(schedule.get(at(12, 0, 30)).unwrap().min_soc, Some(KilowattHours(5.0)));
        Ok(())
    }

    #[test]
    fn test_floor_computed_inside_window_without_entry() -> Result {
        let now = at(12, 1, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.01, |_| 0.0);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent(20.0), &mut schedule, now)?;

        let entry = schedule.get(at(12, 0, 30)).unwrap();
        let held = model.rows().iter().find(|row| row.period_start == at(12, 1, 1)).unwrap();
        assert_eq!(held.battery, entry.min_soc);
        Ok(())
    }

    #[test]
    fn test_battery_depleted_time() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.125, |_| 0.0);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent(20.0), &mut schedule, now)?;

        // One usable kilowatt-hour lasts eight minutes:
        assert_eq!(model.battery_depleted_time(&Percent(20.0), now)?, Some(at(11, 12, 8)));
        assert_eq!(model.battery_depleted_time(&Percent(10.0), now)?, None);
        Ok(())
    }

    #[test]
    fn test_battery_outlasts_projection() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.0, |_| 0.0);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent(80.0), &mut schedule, now)?;

        let last = model.rows().last().unwrap().period_start;
        assert_eq!(model.battery_depleted_time(&Percent(80.0), now)?, Some(last));
        Ok(())
    }

    #[test]
    fn test_history_retained() -> Result {
        let now = at(11, 12, 0);
        let mut model = model(time(0, 30), time(4, 30));
        let (forecast, load) = frames(now, |_| 0.01, sunny);
        let mut schedule = Schedule::default();
        model.refresh(&forecast, &load, &Percent(50.0), &mut schedule, now)?;
        let simulated =
            model.rows().iter().find(|row| row.period_start == at(11, 13, 0)).copied().unwrap();
        let mut history = model.rows().iter().filter(|row| row.period_start <= now);
        assert!(history.all(|row| row.battery.is_none()));

        let later = at(11, 14, 0);
        model.refresh(&forecast, &load, &Percent(50.0), &mut schedule, later)?;
        let kept = model.rows().iter().find(|row| row.period_start == at(11, 13, 0)).unwrap();
        assert_eq!(*kept, simulated);
        assert!(model.rows().windows(2).all(|pair| pair[0].period_start < pair[1].period_start));
        assert!(model.rows().iter().all(|row| row.period_start > later - HISTORY_RETENTION));
        Ok(())
    }

    #[test]
    fn test_not_ready() {
        let model = model(time(0, 30), time(4, 30));
        let schedule = Schedule::default();
        let now = at(11, 12, 0);
        assert!(model.total_charge(&schedule, now).is_err());
        assert!(model.peak_grid_import(now).is_err());
        assert!(model.next_dawn_time(now).is_err());
        assert!(model.battery_depleted_time(&Percent(50.0), now).is_err());
    }
}
