//! Battery controller: keeps the input models, the simulation and the schedule together.

use chrono::{DateTime, Local, TimeDelta};

use crate::{
    api::{
        forecast_provider::ForecastProvider,
        history_provider::HistoryProvider,
        state_of_charge::StateOfChargeSensor,
    },
    cache::State,
    core::{
        battery::BatteryUtils,
        forecast::ForecastModel,
        load::LoadModel,
        model::BatteryModel,
        schedule::{Schedule, ScheduleEntry},
        window::EcoWindow,
    },
    error::NoData,
    prelude::*,
    quantity::{energy::KilowattHours, percent::Percent},
};

/// Cached forecast older than this is re-fetched.
const FORECAST_CACHE_TTL: TimeDelta = TimeDelta::days(1);

#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Refresh {
    /// The inputs are not ready, the previous state is kept.
    Skipped,

    Refreshed,
}

pub struct Planner {
    window: EcoWindow,
    battery: BatteryUtils,
    load: LoadModel,
    forecast: ForecastModel,
    model: BatteryModel,
    schedule: Schedule,
    last_update: Option<DateTime<Local>>,
    forecast_updated_at: Option<DateTime<Local>>,
}

#[bon::bon]
impl Planner {
    #[builder]
    pub fn new(
        window: EcoWindow,
        battery: BatteryUtils,
        dawn_buffer: KilowattHours,
        day_buffer: KilowattHours,
        load: LoadModel,
    ) -> Self {
        let model = BatteryModel::builder()
            .window(window)
            .battery(battery)
            .dawn_buffer(dawn_buffer)
            .day_buffer(day_buffer)
            .build();
        Self {
            window,
            battery,
            load,
            forecast: ForecastModel::default(),
            model,
            schedule: Schedule::default(),
            last_update: None,
            forecast_updated_at: None,
        }
    }
}

impl Planner {
    #[must_use]
    pub const fn ready(&self) -> bool {
        self.load.ready() && self.forecast.ready() && self.model.ready()
    }

    pub const fn window(&self) -> EcoWindow {
        self.window
    }

    pub const fn battery(&self) -> BatteryUtils {
        self.battery
    }

    #[must_use]
    pub const fn load(&self) -> &LoadModel {
        &self.load
    }

    #[must_use]
    pub const fn forecast(&self) -> &ForecastModel {
        &self.forecast
    }

    #[must_use]
    pub const fn model(&self) -> &BatteryModel {
        &self.model
    }

    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    #[must_use]
    pub const fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    #[must_use]
    pub const fn forecast_updated_at(&self) -> Option<DateTime<Local>> {
        self.forecast_updated_at
    }

    /// Restore the persisted rows and schedule, and the forecast unless it is stale.
    #[instrument(skip_all, fields(now = %now))]
    pub fn restore(&mut self, state: State, now: DateTime<Local>) {
        self.model.restore(state.rows);
        self.schedule = state.schedule;
        self.schedule.housekeeping(now);
        match state.forecast_updated_at {
            Some(updated_at) if now - updated_at < FORECAST_CACHE_TTL => {
                info!(%updated_at, "loading the cached forecast…");
                match self.forecast.load(state.forecast) {
                    Ok(()) => self.forecast_updated_at = Some(updated_at),
                    Err(error) => warn!("{error:#}"),
                }
            }
            Some(updated_at) => info!(%updated_at, "the cached forecast is stale"),
            None => {}
        }
    }

    #[must_use]
    pub fn to_state(&self) -> State {
        State {
            rows: self.model.rows().to_vec(),
            schedule: self.schedule.clone(),
            forecast: self.forecast.raw_data().map(<[_]>::to_vec).unwrap_or_default(),
            forecast_updated_at: self.forecast_updated_at,
        }
    }

    pub async fn refresh_load(
        &mut self,
        history: &dyn HistoryProvider,
        now: DateTime<Local>,
    ) -> Result {
        self.load.refresh(history, now).await
    }

    pub async fn refresh_forecast(
        &mut self,
        provider: &dyn ForecastProvider,
        now: DateTime<Local>,
    ) -> Result {
        self.forecast.refresh(provider).await?;
        self.forecast_updated_at = Some(now);
        Ok(())
    }

    /// Re-run the simulation.
    ///
    /// Fails only when the state-of-charge is unavailable, so that the caller may retry.
    #[instrument(skip_all, fields(now = %now))]
    pub fn refresh(
        &mut self,
        state_of_charge: &dyn StateOfChargeSensor,
        now: DateTime<Local>,
    ) -> Result<Refresh, NoData> {
        let (Ok(forecast), Ok(load)) = (self.forecast.frame(), self.load.frame()) else {
            warn!(
                load_ready = self.load.ready(),
                forecast_ready = self.forecast.ready(),
                "the inputs are not ready, skipping",
            );
            return Ok(Refresh::Skipped);
        };
        if let Err(error) =
            self.model.refresh(forecast, load, state_of_charge, &mut self.schedule, now)
        {
            warn!("{error:#}");
            return Err(error);
        }
        self.last_update = Some(now);
        info!("refreshed the battery model");
        Ok(Refresh::Refreshed)
    }

    pub fn state_at_eco_start(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.model.state_at_eco_start(&self.schedule, now)
    }

    pub fn dawn_charge(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.model.dawn_charge(&self.schedule, now)
    }

    pub fn day_charge(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.model.day_charge(&self.schedule, now)
    }

    pub fn total_charge(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.model.total_charge(&self.schedule, now)
    }

    pub fn min_soc(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.model.min_soc(&self.schedule, now)
    }

    /// State-of-charge target for the next window.
    pub fn charge_to_percent(&self, now: DateTime<Local>) -> Result<Percent, NoData> {
        Ok(self.battery.charge_to_percent(self.min_soc(now)?))
    }

    pub fn battery_depleted_time(
        &self,
        state_of_charge: &dyn StateOfChargeSensor,
        now: DateTime<Local>,
    ) -> Result<Option<DateTime<Local>>, NoData> {
        self.model.battery_depleted_time(state_of_charge, now)
    }

    pub fn peak_grid_import(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.model.peak_grid_import(now)
    }

    pub fn peak_grid_export(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        self.model.peak_grid_export(now)
    }

    pub fn next_dawn_time(&self, now: DateTime<Local>) -> Result<DateTime<Local>, NoData> {
        self.model.next_dawn_time(now)
    }

    pub fn todays_dawn_time(&self, now: DateTime<Local>) -> Result<DateTime<Local>, NoData> {
        self.model.todays_dawn_time(now)
    }

    /// Add the energy on top of the required charge at the next window, and re-plan.
    #[instrument(skip_all, fields(value = %value, now = %now))]
    pub fn set_boost(
        &mut self,
        value: KilowattHours,
        state_of_charge: &dyn StateOfChargeSensor,
        now: DateTime<Local>,
    ) -> Result<Refresh, NoData> {
        let next_start = self.window.next_start(now);
        self.schedule.upsert(next_start, ScheduleEntry::builder().boost_status(value).build());
        self.refresh(state_of_charge, now)
    }

    pub fn boost(&self, now: DateTime<Local>) -> KilowattHours {
        self.schedule
            .get(self.window.next_start(now))
            .and_then(|entry| entry.boost_status)
            .unwrap_or_default()
    }

    /// Request the full charge at the next window, and re-plan.
    #[instrument(skip_all, fields(on = on, now = %now))]
    pub fn set_full(
        &mut self,
        on: bool,
        state_of_charge: &dyn StateOfChargeSensor,
        now: DateTime<Local>,
    ) -> Result<Refresh, NoData> {
        let next_start = self.window.next_start(now);
        let value = if on { self.battery.capacity() } else { KilowattHours::ZERO };
        self.schedule.upsert(next_start, ScheduleEntry::builder().full_status(value).build());
        self.refresh(state_of_charge, now)
    }

    #[must_use]
    pub fn full(&self, now: DateTime<Local>) -> bool {
        self.schedule
            .get(self.window.next_start(now))
            .and_then(|entry| entry.full_status)
            .is_some_and(|value| value != KilowattHours::ZERO)
    }

    /// Entries strictly between the instants.
    pub fn schedule_between(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> impl Iterator<Item = (&DateTime<Local>, &ScheduleEntry)> {
        self.schedule.between(start, end)
    }

    /// Drop all the entries, including the overrides, and re-plan.
    pub fn clear_schedule(
        &mut self,
        state_of_charge: &dyn StateOfChargeSensor,
        now: DateTime<Local>,
    ) -> Result<Refresh, NoData> {
        self.schedule.clear();
        self.refresh(state_of_charge, now)
    }

    pub fn housekeeping(&mut self, now: DateTime<Local>) -> usize {
        self.schedule.housekeeping(now)
    }
}
