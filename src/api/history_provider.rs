use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::{core::series::Series, prelude::*};

/// Source of recorded sensor states.
#[async_trait]
pub trait HistoryProvider: Sync {
    /// Get the numeric states recorded within `from..=to`, ordered by time.
    ///
    /// An unknown entity or an empty period yields an empty series.
    async fn get_samples(
        &self,
        entity_id: &str,
        from: DateTime<Local>,
        to: DateTime<Local>,
    ) -> Result<Series<f64>>;
}
