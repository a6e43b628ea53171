mod plan;
mod rehearse;

use std::path::PathBuf;

use chrono::NaiveTime;
use clap::{Parser, Subcommand, ValueEnum};

pub use self::{
    plan::{boost, full, plan, schedule},
    rehearse::rehearse,
};
use crate::{
    core::{
        battery::BatteryUtils,
        window::{EcoWindow, parse_time_of_day},
    },
    error::ConfigurationInvalid,
    quantity::{
        electric::{Amperes, Volts},
        energy::KilowattHours,
        percent::Percent,
    },
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: refresh the models, simulate the battery, and print the plan.
    #[clap(name = "plan")]
    Plan(Box<PlanArgs>),

    /// Charge the energy on top of the required charge at the next window.
    #[clap(name = "boost")]
    Boost(Box<BoostArgs>),

    /// Charge the battery fully at the next window.
    #[clap(name = "full")]
    Full(Box<FullArgs>),

    /// Print the persisted schedule.
    #[clap(name = "schedule")]
    Schedule(StateArgs),

    /// Plan, and walk the inverter through the next window without touching it.
    #[clap(name = "rehearse")]
    Rehearse(Box<RehearseArgs>),
}

#[must_use]
#[derive(Parser)]
pub struct StateArgs {
    /// Model rows, schedule, and the cached forecast.
    #[clap(long = "state-file", env = "STATE_FILE", default_value = "eco-charger.json")]
    pub path: PathBuf,
}

#[must_use]
#[derive(Copy, Clone, Parser)]
pub struct WindowArgs {
    /// Off-peak window start, `HH:MM`.
    #[clap(
        long = "eco-start",
        env = "ECO_START_TIME",
        default_value = "00:30",
        value_parser = parse_time_of_day
    )]
    pub start: NaiveTime,

    /// Off-peak window end, `HH:MM`.
    #[clap(
        long = "eco-end",
        env = "ECO_END_TIME",
        default_value = "04:30",
        value_parser = parse_time_of_day
    )]
    pub end: NaiveTime,
}

impl WindowArgs {
    pub fn window(self) -> Result<EcoWindow, ConfigurationInvalid> {
        EcoWindow::try_new(self.start, self.end)
    }
}

#[must_use]
#[derive(Copy, Clone, Parser)]
pub struct BatteryArgs {
    /// Battery capacity in kilowatt-hours.
    #[clap(long = "capacity-kwh", env = "BATTERY_CAPACITY_KWH")]
    pub capacity: KilowattHours,

    /// Minimal state-of-charge percent.
    #[clap(long = "min-soc-percent", env = "MIN_SOC_PERCENT", default_value = "10")]
    pub min_soc: Percent,

    /// Energy kept on top of the charge needed to reach the dawn.
    #[clap(long = "dawn-buffer-kwh", env = "DAWN_BUFFER_KWH", default_value = "1")]
    pub dawn_buffer: KilowattHours,

    /// Energy kept on top of the charge needed to get through the day.
    #[clap(long = "day-buffer-kwh", env = "DAY_BUFFER_KWH", default_value = "2")]
    pub day_buffer: KilowattHours,
}

impl BatteryArgs {
    pub fn battery(self) -> Result<BatteryUtils, ConfigurationInvalid> {
        BatteryUtils::try_new(self.capacity, self.min_soc)
    }
}

#[must_use]
#[derive(Parser)]
pub struct SourceArgs {
    /// House power sensor in kilowatts.
    #[clap(long = "house-power-entity", env = "HOUSE_POWER_ENTITY")]
    pub house_power_entity: String,

    /// Auxiliary power sensors in watts, subtracted from the house power.
    #[clap(
        long = "aux-power-entity",
        env = "AUX_POWER_ENTITIES",
        value_delimiter = ',',
        num_args = 0..,
    )]
    pub aux_power_entities: Vec<String>,

    /// Home Assistant history export.
    #[clap(long = "history-file", env = "HISTORY_FILE")]
    pub history_file: PathBuf,

    /// Solcast estimated actuals response.
    #[clap(long = "actuals-file", env = "SOLCAST_ACTUALS_FILE")]
    pub actuals_file: PathBuf,

    /// Solcast forecast response.
    #[clap(long = "forecast-file", env = "SOLCAST_FORECAST_FILE")]
    pub forecast_file: PathBuf,
}

#[must_use]
#[derive(Parser)]
pub struct PlanArgs {
    #[clap(flatten)]
    pub state: StateArgs,

    #[clap(flatten)]
    pub window: WindowArgs,

    #[clap(flatten)]
    pub battery: BatteryArgs,

    #[clap(flatten)]
    pub sources: SourceArgs,

    /// Current battery state-of-charge percent, unavailable when omitted.
    #[clap(long = "state-of-charge", env = "STATE_OF_CHARGE")]
    pub state_of_charge: Option<Percent>,
}

#[must_use]
#[derive(Parser)]
pub struct BoostArgs {
    /// Extra energy in kilowatt-hours, zero to cancel.
    pub value: KilowattHours,

    #[clap(flatten)]
    pub plan: PlanArgs,
}

#[derive(Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[must_use]
#[derive(Parser)]
pub struct FullArgs {
    #[clap(value_enum)]
    pub toggle: Toggle,

    #[clap(flatten)]
    pub plan: PlanArgs,
}

#[must_use]
#[derive(Parser)]
pub struct RehearseArgs {
    #[clap(flatten)]
    pub plan: PlanArgs,

    /// Minimal state-of-charge percent the inverter is released to after the window.
    #[clap(
        long = "original-min-soc-percent",
        env = "ORIGINAL_MIN_SOC_PERCENT",
        default_value = "10"
    )]
    pub original_min_soc: Percent,

    /// Maximal charge current.
    #[clap(long = "charge-amps", env = "CHARGE_AMPS", default_value = "20")]
    pub charge_current: Amperes,

    /// Nominal battery voltage.
    #[clap(long = "battery-volts", env = "BATTERY_VOLTS", default_value = "208")]
    pub battery_voltage: Volts,

    /// Throttle the charge current to spread the charge over the window.
    #[clap(long = "custom-charge-profile", env = "CUSTOM_CHARGE_PROFILE")]
    pub custom_charge_profile: bool,

    /// Feed every n-th projected minute of the window as a state-of-charge update.
    #[clap(long = "soc-step-minutes", default_value = "15")]
    pub soc_step: usize,
}
