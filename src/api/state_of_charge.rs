use crate::quantity::percent::Percent;

/// Live state-of-charge reading.
pub trait StateOfChargeSensor {
    /// The current reading, or `None` while the sensor is unknown or unavailable.
    fn state_of_charge(&self) -> Option<Percent>;
}

impl StateOfChargeSensor for Option<Percent> {
    fn state_of_charge(&self) -> Option<Percent> {
        *self
    }
}

impl StateOfChargeSensor for Percent {
    fn state_of_charge(&self) -> Option<Percent> {
        Some(*self)
    }
}
