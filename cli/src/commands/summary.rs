use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrack_core::aggregate::overall_health;
use nutrack_core::models::Mood;
use nutrack_core::service::NutrientService;

use super::helpers::{no_neg_zero, parse_date, print_progress_table};

pub(crate) fn cmd_summary(
    service: &NutrientService,
    date: Option<String>,
    goals_only: bool,
    json: bool,
) -> Result<()> {
    let date = parse_date(date, service.today())?;
    let progress = service.daily_progress(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
        return Ok(());
    }

    println!("=== {} ===\n", progress.date);

    if goals_only {
        if progress.goals.is_empty() {
            eprintln!("No goals set. Use `nutrack goal set <nutrient> <amount>` to add one.");
            process::exit(2);
        }
        print_progress_table(&progress.goals);
    } else {
        print_progress_table(&progress.nutrients);
        if !progress.goals.is_empty() {
            println!("\n  CUSTOM GOALS");
            print_progress_table(&progress.goals);
        }
    }

    let health = no_neg_zero(progress.overall_health);
    println!("\n  OVERALL HEALTH: {health:.0}% ({})", progress.mood);

    Ok(())
}

#[derive(Tabled, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Nutrients")]
    nutrients: usize,
    #[tabled(rename = "Health")]
    #[serde(skip)]
    health_display: String,
    #[tabled(skip)]
    overall_health: f64,
    #[tabled(rename = "Mood")]
    mood: Mood,
}

/// One row per day, newest first, ending at `today`.
fn history_rows(service: &NutrientService, today: NaiveDate, days: u32) -> Result<Vec<HistoryRow>> {
    let mut rows = Vec::new();
    for i in 0..days {
        let date = today - chrono::Duration::days(i64::from(i));
        let totals = service.totals_for(date)?;
        let health = no_neg_zero(overall_health(&totals, service.catalog()));
        rows.push(HistoryRow {
            date: date.format("%Y-%m-%d").to_string(),
            nutrients: totals.len(),
            health_display: format!("{health:.0}%"),
            overall_health: health,
            mood: Mood::from_health(health),
        });
    }
    Ok(rows)
}

pub(crate) fn cmd_history(service: &NutrientService, days: u32, json: bool) -> Result<()> {
    let rows = history_rows(service, service.today(), days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.iter().all(|r| r.nutrients == 0) {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
