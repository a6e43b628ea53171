//! Average household load profile.

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeDelta};

use crate::{
    api::history_provider::HistoryProvider,
    core::{
        series::{Point, Resample, Series},
        window::EcoWindow,
    },
    error::NoData,
    prelude::*,
    quantity::{
        energy::KilowattHours,
        power::{Kilowatts, Watts},
    },
};

const ONE_MINUTE: TimeDelta = TimeDelta::minutes(1);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerUnit {
    Kilowatts,
    Watts,
}

impl PowerUnit {
    fn to_kilowatts(self, value: f64) -> Kilowatts {
        match self {
            Self::Kilowatts => Kilowatts(value),
            Self::Watts => Kilowatts::from(Watts(value)),
        }
    }
}

/// Power sensor and the trailing period of its history to track.
#[must_use]
#[derive(Clone, Debug)]
pub struct HistorySensor {
    pub entity_id: String,
    pub period: TimeDelta,
    pub unit: PowerUnit,
}

/// Primary power sensor net of the secondary ones.
#[must_use]
#[derive(Clone, Debug)]
pub struct TrackedSensor {
    pub primary: HistorySensor,
    pub secondary: Vec<HistorySensor>,
}

impl TrackedSensor {
    /// House power in kilowatts minus auxiliary loads in watts.
    pub fn house_load(house_power: &str, aux_power: &[String], period: TimeDelta) -> Self {
        Self {
            primary: HistorySensor {
                entity_id: house_power.to_string(),
                period,
                unit: PowerUnit::Kilowatts,
            },
            secondary: aux_power
                .iter()
                .map(|entity_id| HistorySensor {
                    entity_id: entity_id.clone(),
                    period,
                    unit: PowerUnit::Watts,
                })
                .collect(),
        }
    }

    /// Fetch the history and resample it into per-minute net energy.
    ///
    /// Returns `None` when any of the sensors has no recorded states.
    #[instrument(skip_all, fields(entity_id = %self.primary.entity_id))]
    async fn fetch(
        &self,
        history: &dyn HistoryProvider,
        now: DateTime<Local>,
    ) -> Result<Option<Series<KilowattHours>>> {
        let Some(mut net_load) = fetch_energy(history, &self.primary, now).await? else {
            return Ok(None);
        };
        for sensor in &self.secondary {
            let Some(aux_load) = fetch_energy(history, sensor, now).await? else {
                return Ok(None);
            };
            let aux_load: HashMap<_, _> = aux_load.into_iter().collect();
            for (timestamp, load) in &mut net_load {
                *load -= aux_load.get(timestamp).copied().unwrap_or_default();
            }
        }
        Ok(Some(net_load))
    }
}

/// Fetch the sensor history and convert it into energy per minute.
///
/// The series is padded with zero at the period start and with the last known value at the end,
/// so that it covers the whole period.
async fn fetch_energy(
    history: &dyn HistoryProvider,
    sensor: &HistorySensor,
    now: DateTime<Local>,
) -> Result<Option<Series<KilowattHours>>> {
    let from = now - sensor.period;
    let samples = history
        .get_samples(&sensor.entity_id, from, now)
        .await
        .with_context(|| format!("failed to fetch `{}`", sensor.entity_id))?;
    let Some(&(_, last_value)) = samples.last() else {
        warn!(entity_id = %sensor.entity_id, "no history");
        return Ok(None);
    };
    let padded = std::iter::once((from, 0.0))
        .chain(samples)
        .chain(std::iter::once((now, last_value)))
        .map(|(timestamp, value)| (timestamp, sensor.unit.to_kilowatts(value)));
    Ok(Some(
        padded
            .forward_fill_minutely()
            .into_iter()
            .map(|(timestamp, power)| (timestamp, power * ONE_MINUTE))
            .collect(),
    ))
}

/// Minute-by-minute net house load over the trailing days.
pub struct LoadModel {
    window: EcoWindow,
    house_load: TrackedSensor,
    recent_load: Option<TrackedSensor>,
    frame: Option<Series<KilowattHours>>,
    recent: Option<Kilowatts>,
}

impl LoadModel {
    pub const HISTORY_PERIOD: TimeDelta = TimeDelta::days(2);
    pub const RECENT_PERIOD: TimeDelta = TimeDelta::minutes(15);

    pub fn new(window: EcoWindow, house_power: &str, aux_power: &[String]) -> Self {
        Self {
            window,
            house_load: TrackedSensor::house_load(house_power, aux_power, Self::HISTORY_PERIOD),
            recent_load: Some(TrackedSensor::house_load(
                house_power,
                aux_power,
                Self::RECENT_PERIOD,
            )),
            frame: None,
            recent: None,
        }
    }

    /// Track only the trailing days, without the recent estimate.
    pub fn without_recent(mut self) -> Self {
        self.recent_load = None;
        self
    }

    #[must_use]
    pub const fn ready(&self) -> bool {
        self.frame.is_some()
    }

    /// Re-fetch the history.
    ///
    /// Missing history leaves the model as it was.
    #[instrument(skip_all)]
    pub async fn refresh(&mut self, history: &dyn HistoryProvider, now: DateTime<Local>) -> Result {
        info!("refreshing the house load…");
        let Some(frame) = self.house_load.fetch(history, now).await? else {
            return Ok(());
        };
        let recent = match &self.recent_load {
            Some(sensor) => sensor.fetch(history, now).await?.map(|series| average_power(&series)),
            None => None,
        };
        info!(n_minutes = frame.len(), ?recent, "refreshed the house load");
        self.frame = Some(frame);
        if recent.is_some() {
            self.recent = recent;
        }
        Ok(())
    }

    /// Replace the frame, bypassing the history provider.
    pub fn load(&mut self, frame: Series<KilowattHours>) {
        self.frame = Some(frame);
    }

    pub fn frame(&self) -> Result<&[Point<KilowattHours>], NoData> {
        self.frame.as_deref().ok_or(NoData("no house load data available"))
    }

    fn n_days(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n_days = self.house_load.primary.period.num_days().max(1) as f64;
        n_days
    }

    /// Mean daily house load.
    pub fn average_all_house_load(&self) -> Result<KilowattHours, NoData> {
        let total: KilowattHours = self.frame()?.iter().map(|(_, load)| *load).sum();
        Ok((total / self.n_days()).round2())
    }

    /// Mean daily house load within the off-peak window.
    pub fn average_peak_house_load(&self) -> Result<KilowattHours, NoData> {
        let total: KilowattHours = self
            .frame()?
            .iter()
            .filter(|(timestamp, _)| self.window.contains(timestamp.time()))
            .map(|(_, load)| *load)
            .sum();
        Ok((total / self.n_days()).round2())
    }

    /// Mean house power over the last minutes.
    pub fn recent_house_load(&self) -> Result<Kilowatts, NoData> {
        self.recent.map(Kilowatts::round2).ok_or(NoData("no recent house load available"))
    }
}

fn average_power(series: &[Point<KilowattHours>]) -> Kilowatts {
    let total: KilowattHours = series.iter().map(|(_, energy)| *energy).sum();
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let duration = ONE_MINUTE * (series.len().max(1) as i32);
    total / duration
}
