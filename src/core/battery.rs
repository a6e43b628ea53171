use crate::{
    error::ConfigurationInvalid,
    quantity::{energy::KilowattHours, percent::Percent},
};

/// Conversions between usable battery energy and state-of-charge.
///
/// Energy here is always measured above the minimum reserve.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct BatteryUtils {
    capacity: KilowattHours,
    min_soc: Percent,
}

impl BatteryUtils {
    pub fn try_new(
        capacity: KilowattHours,
        min_soc: Percent,
    ) -> Result<Self, ConfigurationInvalid> {
        if capacity.0.is_nan() || capacity <= KilowattHours::ZERO {
            return Err(ConfigurationInvalid::Capacity(capacity.0));
        }
        if !(0.0..100.0).contains(&min_soc.0) {
            return Err(ConfigurationInvalid::MinStateOfCharge(min_soc.0));
        }
        Ok(Self { capacity, min_soc })
    }

    #[must_use]
    pub const fn capacity(self) -> KilowattHours {
        self.capacity
    }

    /// Energy kept back by the minimum state-of-charge.
    #[must_use]
    pub fn reserve(self) -> KilowattHours {
        self.capacity * self.min_soc.to_proportion()
    }

    #[must_use]
    pub fn available_capacity(self) -> KilowattHours {
        (self.capacity - self.reserve()).round2()
    }

    /// Clamp the requested energy to the available capacity.
    #[must_use]
    pub fn ceiling(self, requested: KilowattHours) -> KilowattHours {
        requested.min(self.available_capacity()).round2()
    }

    /// Convert the usable energy into the state-of-charge percentage, capped at 100%.
    ///
    /// Halves round to the even percent.
    #[must_use]
    pub fn charge_to_percent(self, energy: KilowattHours) -> Percent {
        let percent = ((energy / self.capacity) + self.min_soc.to_proportion()) * 100.0;
        Percent(percent.round_ties_even().min(100.0))
    }

    /// Convert the state-of-charge reading into the usable energy above the reserve.
    #[must_use]
    pub fn percent_to_charge(self, state_of_charge: Percent) -> KilowattHours {
        self.capacity * state_of_charge.to_proportion() - self.reserve()
    }
}
