use std::fmt::Display;

use chrono::{DateTime, DurationRound, Local, TimeDelta};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use itertools::Itertools;

use crate::{
    api::state_of_charge::StateOfChargeSensor,
    core::{model::Period, planner::Planner, schedule::ScheduleEntry},
    error::NoData,
    quantity::energy::KilowattHours,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn energy_cell(value: Option<KilowattHours>) -> Cell {
    match value {
        Some(value) => Cell::new(value).set_alignment(CellAlignment::Right),
        None => Cell::new("-").set_alignment(CellAlignment::Right).add_attribute(Attribute::Dim),
    }
}

pub fn build_schedule_table<'a>(
    entries: impl IntoIterator<Item = (&'a DateTime<Local>, &'a ScheduleEntry)>,
) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Date", "Start", "End", "Battery", "Load", "Forecast", "Dawn", "Day", "Total", "Min SoC",
        "Import", "Export", "Boost",
    ]);
    for (start, entry) in entries {
        table.add_row(vec![
            Cell::new(start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(start.format("%H:%M")),
            Cell::new(entry.eco_end.map_or_else(String::new, |end| end.format("%H:%M").to_string()))
                .add_attribute(Attribute::Dim),
            energy_cell(entry.battery),
            energy_cell(entry.load),
            energy_cell(entry.forecast),
            energy_cell(entry.dawn),
            energy_cell(entry.day),
            energy_cell(entry.total).fg(if entry.total.unwrap_or_default() > KilowattHours::ZERO {
                Color::DarkYellow
            } else {
                Color::Green
            }),
            energy_cell(entry.min_soc),
            energy_cell(entry.import).fg(Color::Red),
            energy_cell(entry.export).fg(Color::Green),
            energy_cell(Some(entry.boost()).filter(|boost| *boost != KilowattHours::ZERO)),
        ]);
    }
    table
}

/// Hourly projection from now on.
pub fn build_projection_table(rows: &[Period], now: DateTime<Local>) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Hour", "Load", "Solar", "Battery", "Grid"]);
    let hours = rows
        .iter()
        .filter(|row| row.period_start > now && row.battery.is_some())
        .chunk_by(|row| {
            row.period_start.duration_trunc(TimeDelta::hours(1)).unwrap_or(row.period_start)
        });
    for (hour, rows) in &hours {
        let rows = rows.collect_vec();
        let load: KilowattHours = rows.iter().map(|row| row.load).sum();
        let solar: KilowattHours = rows.iter().map(|row| row.pv_estimate).sum();
        let grid: KilowattHours = rows.iter().filter_map(|row| row.grid).sum();
        let battery = rows.last().and_then(|row| row.battery).unwrap_or_default();
        table.add_row(vec![
            Cell::new(hour.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(hour.format("%H:%M")),
            Cell::new(load.round2()).set_alignment(CellAlignment::Right),
            Cell::new(solar.round2()).set_alignment(CellAlignment::Right),
            Cell::new(battery.round2()).set_alignment(CellAlignment::Right).fg(
                if battery <= KilowattHours::ZERO { Color::Red } else { Color::Reset },
            ),
            Cell::new(grid.round2()).set_alignment(CellAlignment::Right).fg(
                if grid < KilowattHours::ZERO {
                    Color::Red
                } else if grid > KilowattHours::ZERO {
                    Color::Green
                } else {
                    Color::Reset
                },
            ),
        ]);
    }
    table
}

fn value_cell<T: Display>(value: Result<T, NoData>) -> Cell {
    match value {
        Ok(value) => Cell::new(value).set_alignment(CellAlignment::Right),
        Err(_) => {
            Cell::new("n/a").set_alignment(CellAlignment::Right).add_attribute(Attribute::Dim)
        }
    }
}

pub fn build_summary_table(
    planner: &Planner,
    state_of_charge: &dyn StateOfChargeSensor,
    now: DateTime<Local>,
) -> Table {
    let format_time = |time: DateTime<Local>| time.format("%b %d %H:%M").to_string();
    let depleted_at = planner.battery_depleted_time(state_of_charge, now).map(|time| {
        time.map_or_else(|| "not within the projection".to_string(), format_time)
    });
    let forecast = planner.forecast();
    let load = planner.load();

    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![Cell::new("Next window"), value_cell(Ok(planner.window()))]);
    table.add_row(vec![
        Cell::new("State at window start"),
        value_cell(planner.state_at_eco_start(now)),
    ]);
    table.add_row(vec![Cell::new("Dawn charge"), value_cell(planner.dawn_charge(now))]);
    table.add_row(vec![Cell::new("Day charge"), value_cell(planner.day_charge(now))]);
    table.add_row(vec![
        Cell::new("Total charge").add_attribute(Attribute::Bold),
        value_cell(planner.total_charge(now)),
    ]);
    table.add_row(vec![Cell::new("Min SoC"), value_cell(planner.min_soc(now))]);
    table.add_row(vec![
        Cell::new("Target").add_attribute(Attribute::Bold),
        value_cell(planner.charge_to_percent(now)),
    ]);
    table.add_row(vec![Cell::new("Boost"), value_cell(Ok(planner.boost(now)))]);
    table.add_row(vec![Cell::new("Full charge"), value_cell(Ok(planner.full(now)))]);
    table.add_row(vec![Cell::new("Battery depleted"), value_cell(depleted_at)]);
    table.add_row(vec![Cell::new("Peak grid import"), value_cell(planner.peak_grid_import(now))]);
    table.add_row(vec![Cell::new("Peak grid export"), value_cell(planner.peak_grid_export(now))]);
    table.add_row(vec![
        Cell::new("Today's dawn"),
        value_cell(planner.todays_dawn_time(now).map(format_time)),
    ]);
    table.add_row(vec![
        Cell::new("Next dawn"),
        value_cell(planner.next_dawn_time(now).map(format_time)),
    ]);
    table.add_row(vec![
        Cell::new("Solar today"),
        value_cell(forecast.total_kwh_forecast_today(now)),
    ]);
    table.add_row(vec![
        Cell::new("Solar remaining"),
        value_cell(forecast.total_kwh_forecast_today_remaining(now)),
    ]);
    table.add_row(vec![
        Cell::new("Solar tomorrow"),
        value_cell(forecast.total_kwh_forecast_tomorrow(now)),
    ]);
    table.add_row(vec![Cell::new("Average daily load"), value_cell(load.average_all_house_load())]);
    table.add_row(vec![
        Cell::new("Average off-peak load"),
        value_cell(load.average_peak_house_load()),
    ]);
    table.add_row(vec![Cell::new("Recent load"), value_cell(load.recent_house_load())]);
    table.add_row(vec![
        Cell::new("Last update").add_attribute(Attribute::Dim),
        value_cell(planner.last_update().map(format_time).ok_or(NoData("never refreshed"))),
    ]);
    table
}
