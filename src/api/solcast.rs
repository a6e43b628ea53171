//! Solcast rooftop site responses saved to disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, de::DeserializeOwned};
use serde_with::serde_as;

use crate::{
    api::forecast_provider::{ApiUsage, ForecastProvider, ForecastSample, Site},
    prelude::*,
    quantity::power::Kilowatts,
};

/// Solcast reports 30-minute periods.
const PERIOD: TimeDelta = TimeDelta::minutes(30);

#[serde_as]
#[derive(Deserialize)]
struct EstimatedActuals {
    #[serde_as(as = "serde_with::VecSkipError<_>")]
    estimated_actuals: Vec<Estimate>,
}

#[serde_as]
#[derive(Deserialize)]
struct Forecasts {
    #[serde_as(as = "serde_with::VecSkipError<_>")]
    forecasts: Vec<Estimate>,
}

#[derive(Deserialize)]
struct Estimate {
    period_end: DateTime<Local>,
    pv_estimate: Kilowatts,
}

impl From<Estimate> for ForecastSample {
    fn from(estimate: Estimate) -> Self {
        Self {
            period_start: estimate.period_end - PERIOD,
            period_end: estimate.period_end,
            pv_estimate: estimate.pv_estimate,
        }
    }
}

/// Forecast provider backed by the saved `estimated_actuals` and `forecasts` responses
/// of a single rooftop site.
pub struct SolcastFiles {
    actuals_path: PathBuf,
    forecast_path: PathBuf,
}

impl SolcastFiles {
    pub const fn new(actuals_path: PathBuf, forecast_path: PathBuf) -> Self {
        Self { actuals_path, forecast_path }
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to deserialize `{}`", path.display()))
    }
}

#[async_trait]
impl ForecastProvider for SolcastFiles {
    async fn get_sites(&self) -> Result<Vec<Site>> {
        Ok(vec![Site { resource_id: self.forecast_path.display().to_string() }])
    }

    #[instrument(skip_all, fields(path = %self.actuals_path.display()))]
    async fn get_actuals(&self, _site: &Site) -> Result<Vec<ForecastSample>> {
        let response: EstimatedActuals = Self::read(&self.actuals_path)?;
        Ok(response.estimated_actuals.into_iter().map(ForecastSample::from).collect())
    }

    #[instrument(skip_all, fields(path = %self.forecast_path.display()))]
    async fn get_forecast(&self, _site: &Site) -> Result<Vec<ForecastSample>> {
        let response: Forecasts = Self::read(&self.forecast_path)?;
        Ok(response.forecasts.into_iter().map(ForecastSample::from).collect())
    }

    async fn get_api_usage(&self) -> Result<ApiUsage> {
        Ok(ApiUsage::default())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_deserialize_forecasts_ok() -> Result {
        // language=JSON
        const RESPONSE: &str = r#"
            {
                "forecasts": [
                    {
                        "pv_estimate": 1.2345,
                        "pv_estimate10": 0.9,
                        "pv_estimate90": 1.5,
                        "period_end": "2025-10-11T10:30:00.0000000Z",
                        "period": "PT30M"
                    },
                    {
                        "pv_estimate": "oops",
                        "period_end": "2025-10-11T11:00:00.0000000Z",
                        "period": "PT30M"
                    }
                ]
            }
        "#;
        let response = serde_json::from_str::<Forecasts>(RESPONSE)?;
        assert_eq!(response.forecasts.len(), 1);
        let sample = ForecastSample::from(response.forecasts.into_iter().next().unwrap());
        assert_abs_diff_eq!(sample.pv_estimate.0, 1.2345);
        assert_eq!(sample.period_end - sample.period_start, PERIOD);
        assert_eq!(sample.period_end, DateTime::parse_from_rfc3339("2025-10-11T10:30:00Z")?);
        Ok(())
    }

    #[test]
    fn test_deserialize_estimated_actuals_ok() -> Result {
        // language=JSON
        const RESPONSE: &str = r#"
            {
                "estimated_actuals": [
                    { "pv_estimate": 0, "period_end": "2025-10-11T06:00:00Z", "period": "PT30M" },
                    { "pv_estimate": 0.25, "period_end": "2025-10-11T06:30:00Z", "period": "PT30M" }
                ]
            }
        "#;
        let response = serde_json::from_str::<EstimatedActuals>(RESPONSE)?;
        assert_eq!(response.estimated_actuals.len(), 2);
        Ok(())
    }
}
