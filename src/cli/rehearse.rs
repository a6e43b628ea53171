use crate::{
    api::inverter::{DryRun, Inverter},
    cli::{
        RehearseArgs,
        plan::{now, prepare, report},
    },
    core::{
        orchestrator::{Orchestrator, SETUP_LEAD},
        planner::Refresh,
    },
    prelude::*,
};

/// Plan, then drive the orchestrator through the next window occurrence.
///
/// The state-of-charge updates follow the projection, and the commands are only logged.
#[instrument(skip_all)]
pub async fn rehearse(args: &RehearseArgs) -> Result {
    let now = now();
    let mut planner = prepare(&args.plan, now).await?;
    ensure!(
        planner.refresh(&args.plan.state_of_charge, now)? == Refresh::Refreshed,
        "the inputs are not ready, nothing to rehearse",
    );
    report(&planner, &args.plan, now);

    let window = planner.window();
    let mut orchestrator = Orchestrator::builder()
        .inverter(DryRun)
        .window(window)
        .original_min_soc(args.original_min_soc)
        .user_charge_current(args.charge_current)
        .battery_voltage(args.battery_voltage)
        .custom_charge_profile(args.custom_charge_profile)
        .build();

    let device = orchestrator.inverter().device_info().await?;
    info!(model = %device.model, "using the inverter");

    let start = window.next_start(now);
    let occurrence = window.occurrence(start);
    info!(start = %occurrence.start, end = %occurrence.end, "rehearsing…");

    orchestrator.pre_window_setup(&planner, start - SETUP_LEAD).await;
    orchestrator.window_start().await;
    let battery = planner.battery();
    for row in planner
        .model()
        .rows()
        .iter()
        .filter(|row| occurrence.contains(row.period_start))
        .step_by(args.soc_step.max(1))
    {
        if let Some(energy) = row.battery {
            orchestrator.on_state_of_charge(battery.charge_to_percent(energy)).await;
        }
    }
    orchestrator.window_end().await;

    info!(state = %orchestrator.state(), "rehearsed");
    Ok(())
}
