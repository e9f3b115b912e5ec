use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrack_core::service::NutrientService;

use super::helpers::{format_amount, json_error, parse_date, truncate};

pub(crate) fn cmd_nutrients(service: &NutrientService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct NutrientRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        category: String,
        #[tabled(rename = "Daily")]
        daily: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    let nutrients = service.catalog().list();

    if json {
        println!("{}", serde_json::to_string_pretty(nutrients)?);
        return Ok(());
    }

    let rows: Vec<NutrientRow> = nutrients
        .iter()
        .map(|n| NutrientRow {
            id: n.id.clone(),
            name: n.name.clone(),
            category: serde_json::to_value(n.category)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            daily: format!("{} {}", format_amount(n.recommended_daily), n.unit),
            description: truncate(&n.description, 40),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_log(
    service: &NutrientService,
    nutrient: &str,
    amount: &str,
    json: bool,
) -> Result<()> {
    let Some(entry) = service.log_input(nutrient, amount)? else {
        let msg = format!("Nothing logged: '{amount}' is not a number");
        if json {
            println!("{}", json_error(&msg));
        } else {
            eprintln!("{msg}");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let total = service
            .totals_for(service.today())?
            .get(&entry.nutrient_id)
            .copied()
            .unwrap_or(0.0);
        println!(
            "Logged: {} {} {} (today: {} {})",
            format_amount(entry.amount),
            entry.unit,
            entry.name,
            format_amount(total),
            entry.unit
        );
    }

    Ok(())
}

pub(crate) fn cmd_logs(service: &NutrientService, date: Option<String>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct LogRow {
        #[tabled(rename = "Time (UTC)")]
        time: String,
        #[tabled(rename = "Nutrient")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let date = parse_date(date, service.today())?;
    let boundary = service.boundary();
    let mut logs = service.logs()?;
    logs.retain(|e| boundary.day_of(e.timestamp) == date);

    if json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
        return Ok(());
    }

    if logs.is_empty() {
        eprintln!("No entries for {}", date.format("%Y-%m-%d"));
        process::exit(2);
    }

    let rows: Vec<LogRow> = logs
        .iter()
        .map(|e| {
            let name = service
                .catalog()
                .find(&e.nutrient_id)
                .map_or_else(|| e.nutrient_id.clone(), |n| n.name.clone());
            LogRow {
                time: e.timestamp.format("%H:%M").to_string(),
                name,
                amount: format!("{} {}", format_amount(e.amount), e.unit),
                id: e.id.clone(),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

/// Without `all`, goals and the profile survive.
pub(crate) fn cmd_clear(service: &NutrientService, all: bool, json: bool) -> Result<()> {
    if all {
        service.clear_all()?;
        if json {
            println!("{}", serde_json::json!({ "cleared": "all" }));
        } else {
            println!("All data cleared");
        }
        return Ok(());
    }

    let removed = service.clear_logs()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": removed }));
    } else if removed > 0 {
        println!("Log history and running totals cleared");
    } else {
        eprintln!("Nothing to clear");
    }
    Ok(())
}
