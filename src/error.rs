use thiserror::Error;

/// A required input is missing, stale, or unavailable.
///
/// Recoverable: the current refresh cycle is skipped and the previous state is retained.
#[derive(Debug, Error)]
#[error("no data: {0}")]
pub struct NoData(pub &'static str);

/// Malformed configuration, detected before any model is constructed.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationInvalid {
    #[error("the off-peak window must not start and end at the same time ({0})")]
    EmptyWindow(chrono::NaiveTime),

    #[error("unparsable time of day `{0}`, expected `HH:MM`")]
    TimeOfDay(String),

    #[error("battery capacity must be positive, got {0} kWh")]
    Capacity(f64),

    #[error("minimum state-of-charge must be within 0..100%, got {0}%")]
    MinStateOfCharge(f64),
}

/// Check whether the error chain carries [`NoData`].
pub fn is_no_data(error: &anyhow::Error) -> bool {
    error.downcast_ref::<NoData>().is_some()
}
