use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::power::Kilowatts};

/// Average solar power over a forecast period.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub period_start: DateTime<Local>,
    pub period_end: DateTime<Local>,
    pub pv_estimate: Kilowatts,
}

#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Site {
    pub resource_id: String,
}

/// Daily request quota of the forecast provider.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApiUsage {
    #[serde(rename = "daily_limit_consumed")]
    pub consumed: u32,

    pub daily_limit: u32,
}

impl Default for ApiUsage {
    /// Free-tier quota with nothing consumed.
    fn default() -> Self {
        Self { consumed: 0, daily_limit: 10 }
    }
}

#[async_trait]
pub trait ForecastProvider: Sync {
    async fn get_sites(&self) -> Result<Vec<Site>>;

    async fn get_actuals(&self, site: &Site) -> Result<Vec<ForecastSample>>;

    async fn get_forecast(&self, site: &Site) -> Result<Vec<ForecastSample>>;

    async fn get_api_usage(&self) -> Result<ApiUsage>;

    /// Get the estimated actuals followed by the forecast.
    ///
    /// The first actual period overlaps with the forecast and is skipped.
    #[instrument(skip_all, fields(site = %site.resource_id))]
    async fn get_samples(&self, site: &Site) -> Result<Vec<ForecastSample>> {
        let actuals = self.get_actuals(site).await?;
        let forecast = self.get_forecast(site).await?;
        info!(n_actuals = actuals.len(), n_forecast = forecast.len(), "fetched");
        Ok(actuals.into_iter().skip(1).chain(forecast).collect())
    }
}
