use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrack_core::service::NutrientService;

use super::helpers::format_amount;

pub(crate) fn cmd_goal_set(
    service: &NutrientService,
    nutrient: &str,
    max_value: f64,
    name: Option<String>,
    unit: Option<String>,
    json: bool,
) -> Result<()> {
    let goal = match (name, unit) {
        (None, None) => service.set_goal(nutrient, max_value)?,
        (Some(name), Some(unit)) => service.set_goal_entry(nutrient, &name, &unit, max_value)?,
        _ => bail!("For a custom nutrient, both --name and --unit must be provided"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&goal)?);
    } else {
        println!(
            "Goal set: {} {} {}/day",
            goal.name,
            format_amount(goal.max_value),
            goal.unit
        );
    }
    Ok(())
}

pub(crate) fn cmd_goal_remove(service: &NutrientService, nutrient: &str, json: bool) -> Result<()> {
    let removed = service.remove_goal(nutrient)?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else if removed {
        println!("Goal removed");
    } else {
        eprintln!("No goal was set for '{nutrient}'");
    }
    Ok(())
}

pub(crate) fn cmd_goal_list(service: &NutrientService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct GoalRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Target")]
        target: String,
    }

    let goals = service.list_goals()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else if goals.is_empty() {
        eprintln!("No goals set. Use `nutrack goal set <nutrient> <amount>` to add one.");
    } else {
        let rows: Vec<GoalRow> = goals
            .iter()
            .map(|g| GoalRow {
                id: g.nutrient_id.clone(),
                name: g.name.clone(),
                target: format!("{} {}", format_amount(g.max_value), g.unit),
            })
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    Ok(())
}
