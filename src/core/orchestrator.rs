//! Charge orchestration around the off-peak window.
//!
//! Three daily triggers drive the inverter: the setup shortly before the window start,
//! the window start, and the window end. In between, state-of-charge updates toggle
//! the force charge around the target.

use chrono::{DateTime, Days, Local, NaiveTime, TimeDelta};

use crate::{
    api::inverter::Inverter,
    core::{planner::Planner, window::{EcoWindow, at}},
    error::NoData,
    prelude::*,
    quantity::{
        electric::{Amperes, Volts},
        energy::KilowattHours,
        percent::Percent,
        round2,
    },
};

pub const SETUP_LEAD: TimeDelta = TimeDelta::minutes(5);

/// Reserved at the end of the window when throttling the charge current.
pub const CHARGE_BUFFER: TimeDelta = TimeDelta::minutes(30);

pub const MIN_CHARGE_CURRENT: Amperes = Amperes(2.0);

pub const HYSTERESIS: Percent = Percent(2.0);

/// The charge current steps down above this state-of-charge.
pub const STEP_DOWN_THRESHOLD: Percent = Percent(90.0);

/// Charge plan for the next off-peak window.
pub trait ChargePlan {
    fn total_charge(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData>;

    fn charge_to_percent(&self, now: DateTime<Local>) -> Result<Percent, NoData>;
}

impl ChargePlan for Planner {
    fn total_charge(&self, now: DateTime<Local>) -> Result<KilowattHours, NoData> {
        Self::total_charge(self, now)
    }

    fn charge_to_percent(&self, now: DateTime<Local>) -> Result<Percent, NoData> {
        Self::charge_to_percent(self, now)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum State {
    Idle,
    PreWindowSetup,
    Charging,
    HoldingFloor,
    Disabled,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum Trigger {
    PreWindowSetup,
    WindowStart,
    WindowEnd,
}

#[must_use]
pub struct Orchestrator<I> {
    inverter: I,
    window: EcoWindow,
    original_min_soc: Percent,
    user_charge_current: Amperes,
    battery_voltage: Volts,
    custom_charge_profile: bool,

    state: State,

    /// The last force charge command sent, regardless of its outcome.
    charge_active: bool,

    /// Whether state-of-charge updates are acted upon.
    listening: bool,

    charge_required: KilowattHours,
    percent_target: Percent,
    target_charge_current: Amperes,
}

#[bon::bon]
impl<I: Inverter> Orchestrator<I> {
    #[builder]
    pub fn new(
        inverter: I,
        window: EcoWindow,
        original_min_soc: Percent,
        user_charge_current: Amperes,
        battery_voltage: Volts,
        #[builder(default)] custom_charge_profile: bool,
    ) -> Self {
        Self {
            inverter,
            window,
            original_min_soc,
            user_charge_current,
            battery_voltage,
            custom_charge_profile,
            state: State::Idle,
            charge_active: false,
            listening: false,
            charge_required: KilowattHours::ZERO,
            percent_target: original_min_soc,
            target_charge_current: user_charge_current,
        }
    }
}

impl<I: Inverter> Orchestrator<I> {
    pub const fn inverter(&self) -> &I {
        &self.inverter
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub const fn charge_active(&self) -> bool {
        self.charge_active
    }

    pub const fn percent_target(&self) -> Percent {
        self.percent_target
    }

    pub const fn target_charge_current(&self) -> Amperes {
        self.target_charge_current
    }

    pub fn set_custom_charge_profile(&mut self, on: bool) {
        self.custom_charge_profile = on;
    }

    /// Daily trigger times, none while disabled.
    #[must_use]
    pub fn triggers(&self) -> Vec<(NaiveTime, Trigger)> {
        if self.state == State::Disabled {
            return Vec::new();
        }
        vec![
            (self.window.start() - SETUP_LEAD, Trigger::PreWindowSetup),
            (self.window.start(), Trigger::WindowStart),
            (self.window.end(), Trigger::WindowEnd),
        ]
    }

    /// The earliest trigger at or after the instant.
    #[must_use]
    pub fn next_trigger(&self, now: DateTime<Local>) -> Option<(DateTime<Local>, Trigger)> {
        self.triggers()
            .into_iter()
            .map(|(time, trigger)| {
                let today = at(now.date_naive(), time);
                if today >= now {
                    return (today, trigger);
                }
                let tomorrow =
                    now.date_naive().checked_add_days(Days::new(1)).unwrap_or(now.date_naive());
                (at(tomorrow, time), trigger)
            })
            .min_by_key(|(instant, _)| *instant)
    }

    /// Dispatch the trigger to its handler.
    pub async fn fire(&mut self, trigger: Trigger, plan: &dyn ChargePlan, now: DateTime<Local>) {
        match trigger {
            Trigger::PreWindowSetup => self.pre_window_setup(plan, now).await,
            Trigger::WindowStart => self.window_start().await,
            Trigger::WindowEnd => self.window_end().await,
        }
    }

    /// Read the charge target and reset the inverter before the window.
    ///
    /// The inverter's default is a force charge scheduled over the window, so the reset
    /// re-enables it. The plan is expected to be refreshed by the caller beforehand.
    #[instrument(skip_all, fields(now = %now))]
    pub async fn pre_window_setup(&mut self, plan: &dyn ChargePlan, now: DateTime<Local>) {
        if self.state == State::Disabled {
            debug!("disabled, skipping the setup");
            return;
        }
        self.transition(State::PreWindowSetup);

        self.charge_required = plan.total_charge(now).unwrap_or_else(|error| {
            warn!("{error:#}, assuming no charge is required");
            KilowattHours::ZERO
        });
        self.percent_target = plan.charge_to_percent(now).unwrap_or_else(|error| {
            warn!("{error:#}, targeting the original minimum state-of-charge");
            self.original_min_soc
        });
        info!(
            charge_required = %self.charge_required,
            percent_target = %self.percent_target,
            "planned",
        );

        self.start_force_charge().await;
        self.set_min_soc(self.original_min_soc).await;

        self.target_charge_current = self.charge_current();
        info!(
            current = %self.target_charge_current,
            window = %self.window,
            "setting the charge current…",
        );
        self.set_charge_current(self.target_charge_current).await;
    }

    /// Hold the floor, and keep charging only when the energy is required.
    #[instrument(skip_all)]
    pub async fn window_start(&mut self) {
        if self.state == State::Disabled {
            debug!("disabled, skipping the window start");
            return;
        }
        self.set_min_soc(self.percent_target).await;
        self.listening = true;
        if self.charge_required > KilowattHours::ZERO {
            self.transition(State::Charging);
        } else {
            info!(
                percent_target = %self.percent_target,
                "allowing the discharge down to the target",
            );
            self.stop_force_charge().await;
            self.transition(State::HoldingFloor);
        }
    }

    #[instrument(skip_all, fields(state_of_charge = %state_of_charge))]
    pub async fn on_state_of_charge(&mut self, state_of_charge: Percent) {
        if !self.listening {
            return;
        }

        if self.custom_charge_profile && state_of_charge > STEP_DOWN_THRESHOLD {
            let step_down = Amperes(round2(
                (Percent::HUNDRED - state_of_charge).0 / 10.0 * self.user_charge_current.0,
            ));
            let current = step_down.min(self.target_charge_current).max(MIN_CHARGE_CURRENT);
            self.set_charge_current(current).await;
        }

        if state_of_charge >= self.percent_target && self.charge_active {
            // A full target is charged through for cell balancing.
            if self.percent_target != Percent::HUNDRED {
                self.stop_force_charge().await;
                self.transition(State::HoldingFloor);
            }
        } else if state_of_charge < self.percent_target - HYSTERESIS && !self.charge_active {
            self.start_force_charge().await;
            self.transition(State::Charging);
        }
    }

    /// Release the floor and restore the inverter defaults.
    ///
    /// The default is the force charge scheduled over the window, so it is re-enabled here
    /// rather than stopped. Outside the window the schedule keeps it idle.
    #[instrument(skip_all)]
    pub async fn window_end(&mut self) {
        if self.state == State::Disabled {
            debug!("disabled, skipping the window end");
            return;
        }
        self.listening = false;
        self.start_force_charge().await;
        self.set_charge_current(self.user_charge_current).await;
        info!(min_soc = %self.original_min_soc, "releasing the floor");
        self.set_min_soc(self.original_min_soc).await;
        self.transition(State::Idle);
    }

    #[instrument(skip_all, fields(disable = disable))]
    pub async fn set_disable(&mut self, disable: bool) {
        if disable {
            self.listening = false;
            self.stop_force_charge().await;
            self.transition(State::Disabled);
        } else {
            self.transition(State::Idle);
            self.start_force_charge().await;
        }
    }

    fn charge_current(&self) -> Amperes {
        if !self.custom_charge_profile || self.charge_required <= KilowattHours::ZERO {
            return self.user_charge_current;
        }
        let hours = (self.window.duration() - CHARGE_BUFFER).as_seconds_f64() / 3600.0;
        if hours <= 0.0 {
            return self.user_charge_current;
        }
        let watt_hours = self.charge_required.0 * 1000.0;
        let current = Amperes(round2(watt_hours / self.battery_voltage.0 / hours));
        current.min(self.user_charge_current)
    }

    fn transition(&mut self, state: State) {
        if self.state != state {
            info!(from = %self.state, to = %state, "transition");
            self.state = state;
        }
    }

    async fn start_force_charge(&mut self) {
        self.charge_active = true;
        if let Err(error) = self.inverter.start_force_charge(self.window).await {
            error!("failed to start the force charge: {error:#}");
        }
    }

    async fn stop_force_charge(&mut self) {
        self.charge_active = false;
        if let Err(error) = self.inverter.stop_force_charge().await {
            error!("failed to stop the force charge: {error:#}");
        }
    }

    async fn set_min_soc(&self, min_soc: Percent) {
        if let Err(error) = self.inverter.set_min_soc(min_soc).await {
            error!(%min_soc, "failed to set the minimum state-of-charge: {error:#}");
        }
    }

    async fn set_charge_current(&self, current: Amperes) {
        if let Err(error) = self.inverter.set_charge_current(current).await {
            error!(%current, "failed to set the charge current: {error:#}");
        }
    }
}
