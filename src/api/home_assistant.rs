//! Home Assistant history export, as returned by `GET /api/history/period`.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::Deserialize;
use serde_with::serde_as;

use crate::{
    api::history_provider::HistoryProvider,
    core::series::Series,
    prelude::*,
};

#[must_use]
#[derive(Deserialize, derive_more::Index, derive_more::IntoIterator)]
pub struct EntitiesHistory(pub Vec<EntityHistory>);

/// State changes of a single entity. Non-numeric states like `unavailable` are skipped.
#[must_use]
#[serde_as]
#[derive(Deserialize, derive_more::Index, derive_more::IntoIterator)]
pub struct EntityHistory(#[serde_as(as = "serde_with::VecSkipError<_>")] pub Vec<State>);

#[must_use]
#[serde_as]
#[derive(Deserialize)]
pub struct State {
    pub entity_id: String,

    #[serde(rename = "last_changed")]
    pub last_changed_at: DateTime<Local>,

    #[serde_as(as = "serde_with::DisplayFromStr")]
    #[serde(rename = "state")]
    pub value: f64,
}

/// History provider backed by a saved history export.
pub struct HistoryFile {
    series: HashMap<String, Series<f64>>,
}

impl HistoryFile {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        let history: EntitiesHistory = serde_json::from_str(&contents)
            .with_context(|| format!("failed to deserialize `{}`", path.display()))?;
        let this = Self::from(history);
        info!(n_entities = this.series.len(), "read the history");
        Ok(this)
    }
}

impl From<EntitiesHistory> for HistoryFile {
    fn from(history: EntitiesHistory) -> Self {
        let series = history
            .into_iter()
            .flatten()
            .map(|state| (state.entity_id, (state.last_changed_at, state.value)))
            .into_group_map()
            .into_iter()
            .map(|(entity_id, mut series)| {
                series.sort_by_key(|(timestamp, _)| *timestamp);
                (entity_id, series)
            })
            .collect();
        Self { series }
    }
}

#[async_trait]
impl HistoryProvider for HistoryFile {
    async fn get_samples(
        &self,
        entity_id: &str,
        from: DateTime<Local>,
        to: DateTime<Local>,
    ) -> Result<Series<f64>> {
        let samples: Series<f64> = self
            .series
            .get(entity_id)
            .into_iter()
            .flatten()
            .filter(|(timestamp, _)| (from..=to).contains(timestamp))
            .copied()
            .collect();
        debug!(entity_id, n_samples = samples.len(), "fetched");
        Ok(samples)
    }
}
