use async_trait::async_trait;
use serde::Serialize;

use crate::{
    core::window::EcoWindow,
    prelude::*,
    quantity::{electric::Amperes, percent::Percent},
};

#[must_use]
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo {
    pub model: String,
    pub serial_number: String,
}

/// Inverter charge controls.
///
/// Implementations must tolerate repeated calls: starting an active force charge
/// or stopping an inactive one is a no-op.
#[async_trait]
pub trait Inverter: Sync {
    /// Enable the force charge over the off-peak window.
    ///
    /// It only takes effect between the window bounds, and is the inverter's default state.
    async fn start_force_charge(&self, window: EcoWindow) -> Result;

    async fn stop_force_charge(&self) -> Result;

    async fn set_min_soc(&self, min_soc: Percent) -> Result;

    async fn set_charge_current(&self, current: Amperes) -> Result;

    async fn device_info(&self) -> Result<DeviceInfo>;
}

/// Inverter that only logs the commands.
pub struct DryRun;

#[async_trait]
impl Inverter for DryRun {
    async fn start_force_charge(&self, window: EcoWindow) -> Result {
        info!(%window, "starting the force charge");
        Ok(())
    }

    async fn stop_force_charge(&self) -> Result {
        info!("stopping the force charge");
        Ok(())
    }

    async fn set_min_soc(&self, min_soc: Percent) -> Result {
        info!(%min_soc, "setting the minimum state-of-charge");
        Ok(())
    }

    async fn set_charge_current(&self, current: Amperes) -> Result {
        info!(%current, "setting the charge current");
        Ok(())
    }

    async fn device_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo { model: "dry-run".to_string(), serial_number: String::new() })
    }
}
