//! Per-occurrence record of the computed charge requirements and user overrides.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::energy::KilowattHours};

/// Every field is optional so that partial updates merge into the existing entry.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct ScheduleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco_start: Option<DateTime<Local>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eco_end: Option<DateTime<Local>>,

    /// Usable energy when the occurrence starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<KilowattHours>,

    /// House load over the following day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<KilowattHours>,

    /// Solar production over the following day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<KilowattHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dawn: Option<KilowattHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<KilowattHours>,

    /// Energy added at the occurrence start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<KilowattHours>,

    /// Floor held during the occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_soc: Option<KilowattHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<KilowattHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<KilowattHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_status: Option<KilowattHours>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_status: Option<KilowattHours>,
}

impl ScheduleEntry {
    /// Overwrite the fields that are set in the patch, keeping the rest.
    pub fn merge(&mut self, patch: Self) {
        self.eco_start = patch.eco_start.or(self.eco_start);
        self.eco_end = patch.eco_end.or(self.eco_end);
        self.battery = patch.battery.or(self.battery);
        self.load = patch.load.or(self.load);
        self.forecast = patch.forecast.or(self.forecast);
        self.dawn = patch.dawn.or(self.dawn);
        self.day = patch.day.or(self.day);
        self.total = patch.total.or(self.total);
        self.min_soc = patch.min_soc.or(self.min_soc);
        self.import = patch.import.or(self.import);
        self.export = patch.export.or(self.export);
        self.boost_status = patch.boost_status.or(self.boost_status);
        self.full_status = patch.full_status.or(self.full_status);
    }

    /// Requested override: the larger of boost and full.
    #[must_use]
    pub fn boost(&self) -> KilowattHours {
        self.boost_status.unwrap_or_default().max(self.full_status.unwrap_or_default())
    }
}

/// Schedule entries keyed by the off-peak occurrence start.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(BTreeMap<DateTime<Local>, ScheduleEntry>);

impl Schedule {
    pub const RETENTION: TimeDelta = TimeDelta::days(14);

    pub fn upsert(&mut self, key: DateTime<Local>, patch: ScheduleEntry) {
        debug!(%key, ?patch, "upserting…");
        self.0.entry(key).or_default().merge(patch);
    }

    #[must_use]
    pub fn get(&self, key: DateTime<Local>) -> Option<&ScheduleEntry> {
        self.0.get(&key)
    }

    #[must_use]
    pub const fn get_all(&self) -> &BTreeMap<DateTime<Local>, ScheduleEntry> {
        &self.0
    }

    /// Entries strictly between the instants.
    pub fn between(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> impl Iterator<Item = (&DateTime<Local>, &ScheduleEntry)> {
        self.0.iter().filter(move |(key, _)| start < **key && **key < end)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        info!(n_entries = self.0.len(), "clearing the schedule…");
        self.0.clear();
    }

    /// Drop the entries older than the retention period, returning the number of removed ones.
    pub fn housekeeping(&mut self, now: DateTime<Local>) -> usize {
        let threshold = now - Self::RETENTION;
        let retained = self.0.split_off(&threshold);
        let n_removed = self.0.len();
        self.0 = retained;
        debug!(%threshold, n_removed, "housekeeping done");
        n_removed
    }
}
