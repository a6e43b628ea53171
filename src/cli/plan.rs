use chrono::{DateTime, Local, TimeDelta, Timelike};

use crate::{
    api::{
        forecast_provider::ForecastProvider,
        home_assistant::HistoryFile,
        solcast::SolcastFiles,
    },
    cache::State,
    cli::{BoostArgs, FullArgs, PlanArgs, StateArgs, Toggle},
    core::{
        forecast::refresh_times,
        load::LoadModel,
        planner::{Planner, Refresh},
        window::at,
    },
    prelude::*,
    tables::{build_projection_table, build_schedule_table, build_summary_table},
};

/// Schedule entries shown around now.
const SCHEDULE_VIEW: TimeDelta = TimeDelta::days(2);

#[instrument(skip_all)]
pub async fn plan(args: &PlanArgs) -> Result {
    let now = now();
    let mut planner = prepare(args, now).await?;
    if planner.refresh(&args.state_of_charge, now)? == Refresh::Skipped {
        warn!("the plan is not refreshed");
    }
    report(&planner, args, now);
    planner.to_state().write_to(&args.state.path);
    Ok(())
}

#[instrument(skip_all, fields(value = %args.value))]
pub async fn boost(args: &BoostArgs) -> Result {
    let now = now();
    let mut planner = prepare(&args.plan, now).await?;
    replanned(planner.set_boost(args.value, &args.plan.state_of_charge, now)?, "boost");
    report(&planner, &args.plan, now);
    planner.to_state().write_to(&args.plan.state.path);
    Ok(())
}

#[instrument(skip_all)]
pub async fn full(args: &FullArgs) -> Result {
    let now = now();
    let mut planner = prepare(&args.plan, now).await?;
    let on = args.toggle == Toggle::On;
    replanned(planner.set_full(on, &args.plan.state_of_charge, now)?, "full charge");
    report(&planner, &args.plan, now);
    planner.to_state().write_to(&args.plan.state.path);
    Ok(())
}

/// Warn when the stored override has not been applied to the plan yet.
fn replanned(refresh: Refresh, change: &str) -> bool {
    if refresh == Refresh::Skipped {
        warn!(change, "the plan is not refreshed, the change applies at the next refresh");
        return false;
    }
    true
}

pub fn schedule(args: &StateArgs) {
    let state = State::read_from(&args.path);
    println!("{}", build_schedule_table(state.schedule.get_all()));
}

/// Restore the planner from the state file and refresh its inputs.
pub async fn prepare(args: &PlanArgs, now: DateTime<Local>) -> Result<Planner> {
    let window = args.window.window()?;
    let battery = args.battery.battery()?;
    let mut planner = Planner::builder()
        .window(window)
        .battery(battery)
        .dawn_buffer(args.battery.dawn_buffer)
        .day_buffer(args.battery.day_buffer)
        .load(LoadModel::new(
            window,
            &args.sources.house_power_entity,
            &args.sources.aux_power_entities,
        ))
        .build();
    planner.restore(State::read_from(&args.state.path), now);

    let history = HistoryFile::read_from(&args.sources.history_file)?;
    planner.refresh_load(&history, now).await?;

    let solcast = SolcastFiles::new(
        args.sources.actuals_file.clone(),
        args.sources.forecast_file.clone(),
    );
    if forecast_refresh_due(&planner, &solcast, now).await? {
        planner.refresh_forecast(&solcast, now).await?;
    } else {
        info!("the cached forecast is up to date");
    }

    Ok(planner)
}

/// Whether a planned refresh has passed since the last one.
async fn forecast_refresh_due(
    planner: &Planner,
    provider: &dyn ForecastProvider,
    now: DateTime<Local>,
) -> Result<bool> {
    let Some(updated_at) = planner.forecast_updated_at().filter(|_| planner.forecast().ready())
    else {
        return Ok(true);
    };
    let n_sites = provider.get_sites().await?.len();
    let usage = provider.get_api_usage().await?;
    let times = refresh_times(now, usage, n_sites);
    debug!(?times, %updated_at, "checking the forecast refreshes…");
    Ok(times
        .into_iter()
        .map(|time| at(now.date_naive(), time))
        .any(|refresh_at| updated_at < refresh_at && refresh_at <= now))
}

pub fn report(planner: &Planner, args: &PlanArgs, now: DateTime<Local>) {
    println!("{}", build_projection_table(planner.model().rows(), now));
    let entries = planner.schedule_between(now - SCHEDULE_VIEW, now + SCHEDULE_VIEW);
    println!("{}", build_schedule_table(entries));
    println!("{}", build_summary_table(planner, &args.state_of_charge, now));
}

pub fn now() -> DateTime<Local> {
    let now = Local::now();
    now.with_nanosecond(0).unwrap_or(now)
}
