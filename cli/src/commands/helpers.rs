use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrack_core::models::{ProgressRow, ProgressStatus};

/// `today` comes from the configured day boundary, not the system clock's
/// local date.
pub(crate) fn parse_date(date_str: Option<String>, today: NaiveDate) -> Result<NaiveDate> {
    match date_str {
        None => Ok(today),
        Some(s) => match s.as_str() {
            "today" => Ok(today),
            "yesterday" => Ok(today - chrono::Duration::days(1)),
            "tomorrow" => Ok(today + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn print_progress_table(rows: &[ProgressRow]) {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Nutrient")]
        name: String,
        #[tabled(rename = "Current")]
        current: String,
        #[tabled(rename = "Target")]
        target: String,
        #[tabled(rename = "%")]
        percentage: String,
        #[tabled(rename = "Progress")]
        bar: String,
    }

    let rows: Vec<Row> = rows
        .iter()
        .map(|r| Row {
            name: truncate(&r.name, 20),
            current: format!("{} {}", format_amount(r.current), r.unit),
            target: format!("{} {}", format_amount(r.target), r.unit),
            percentage: format!("{}%", r.percentage),
            bar: progress_bar(r.display_width, r.status),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

const BAR_CELLS: i64 = 20;

/// Fixed-width text bar. `width` is already clamped to 0..=100.
pub(crate) fn progress_bar(width: i64, status: ProgressStatus) -> String {
    let filled = (width * BAR_CELLS + 50) / 100;
    #[allow(clippy::cast_sign_loss)]
    let (filled, empty) = (filled as usize, (BAR_CELLS - filled) as usize);
    let marker = match status {
        ProgressStatus::Normal => "",
        ProgressStatus::NearComplete => " ~",
        ProgressStatus::Exceeded => " !",
    };
    format!("{}{}{marker}", "#".repeat(filled), ".".repeat(empty))
}

/// Whole numbers print without decimals, everything else with at most one.
pub(crate) fn format_amount(v: f64) -> String {
    let v = no_neg_zero(v);
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
