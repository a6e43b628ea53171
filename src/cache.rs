use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{
    api::forecast_provider::ForecastSample,
    core::{model::Period, schedule::Schedule},
    prelude::*,
};

/// Planner state persisted between the runs.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub rows: Vec<Period>,

    #[serde(default)]
    pub schedule: Schedule,

    /// Raw forecast samples as they were fetched.
    #[serde(default)]
    pub forecast: Vec<ForecastSample>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_updated_at: Option<DateTime<Local>>,
}

impl State {
    #[instrument(skip_all, fields(path = %path.display()), name = "Reading the state…")]
    pub fn read_from(path: &Path) -> Self {
        Self::read_fallibly_from(path).unwrap_or_else(|error| {
            error!("failed to load the state, starting afresh: {error:#}");
            Self::default()
        })
    }

    fn read_fallibly_from(path: &Path) -> Result<Self> {
        if path.is_file() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents).context("failed to deserialize the state")?)
        } else {
            Ok(Self::default())
        }
    }

    #[instrument(skip_all, fields(path = %path.display()), name = "Writing the state…")]
    pub fn write_to(&self, path: &Path) {
        if let Err(error) = self.write_fallibly_to(path) {
            error!("failed to save the state: {error:#}");
        }
    }

    fn write_fallibly_to(&self, path: &Path) -> Result {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
