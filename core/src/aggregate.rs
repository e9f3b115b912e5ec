//! Stateless aggregation over logged intake: daily totals, goal percentages,
//! and the status/mood classifications derived from them.
//!
//! Nothing here touches storage. Callers pass in the decoded store contents
//! and the catalog, and get fresh derived values back on every call.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};

use crate::catalog::NutrientCatalog;
use crate::models::{
    GoalEntry, LogEntry, ProgressRow, ProgressStatus, amount_from_value, normalize_key,
};

/// Which clock decides where one calendar day ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    /// Midnight in the device's local timezone.
    #[default]
    Local,
    /// Midnight at a fixed UTC offset.
    Fixed(FixedOffset),
}

impl DayBoundary {
    /// Parse an offset such as `+02:00`, `-05:30`, or `UTC`.
    pub fn from_offset(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            let utc = FixedOffset::east_opt(0).context("zero offset is always valid")?;
            return Ok(Self::Fixed(utc));
        }
        let offset: FixedOffset = s
            .parse()
            .with_context(|| format!("Invalid UTC offset '{s}'. Use e.g. +02:00 or UTC"))?;
        Ok(Self::Fixed(offset))
    }

    #[must_use]
    pub fn day_of(self, ts: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => ts.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => ts.with_timezone(&offset).date_naive(),
        }
    }

    #[must_use]
    pub fn today(self) -> NaiveDate {
        self.day_of(Utc::now())
    }
}

fn effective_amount(entry: &LogEntry) -> f64 {
    if entry.amount.is_finite() && entry.amount >= 0.0 {
        entry.amount
    } else {
        0.0
    }
}

/// Sum of one nutrient's entries falling on `as_of`.
#[must_use]
pub fn daily_total(
    logs: &[LogEntry],
    nutrient_id: &str,
    as_of: NaiveDate,
    boundary: DayBoundary,
) -> f64 {
    let key = normalize_key(nutrient_id);
    logs.iter()
        .filter(|e| boundary.day_of(e.timestamp) == as_of)
        .filter(|e| normalize_key(&e.nutrient_id) == key)
        .map(effective_amount)
        .sum()
}

/// Per-nutrient totals for `as_of`, keyed by canonical catalog id. Entries
/// for nutrients outside the catalog are dropped.
#[must_use]
pub fn daily_totals(
    logs: &[LogEntry],
    catalog: &NutrientCatalog,
    as_of: NaiveDate,
    boundary: DayBoundary,
) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for entry in logs
        .iter()
        .filter(|e| boundary.day_of(e.timestamp) == as_of)
    {
        if let Some(n) = catalog.find(&entry.nutrient_id) {
            *totals.entry(n.id.clone()).or_insert(0.0) += effective_amount(entry);
        }
    }
    totals
}

/// Merge log-derived totals with standalone running-total scalars.
///
/// Log totals win for any nutrient that has entries on `as_of`; scalars only
/// fill in the rest. Scalar keys are matched by canonical id before display
/// name, so an id-keyed scalar beats a legacy name-keyed one.
#[must_use]
pub fn aggregate_all(
    logs: &[LogEntry],
    scalars: &BTreeMap<String, serde_json::Value>,
    catalog: &NutrientCatalog,
    as_of: NaiveDate,
    boundary: DayBoundary,
) -> BTreeMap<String, f64> {
    let mut totals = daily_totals(logs, catalog, as_of, boundary);

    let by_id = scalars
        .iter()
        .filter_map(|(k, v)| catalog.find(k).map(|n| (n, v)));
    let by_name = scalars.iter().filter_map(|(k, v)| {
        if catalog.find(k).is_some() {
            None
        } else {
            catalog.resolve_key(k).map(|n| (n, v))
        }
    });

    for (nutrient, value) in by_id.chain(by_name) {
        if totals.contains_key(&nutrient.id) {
            continue;
        }
        if let Some(amount) = amount_from_value(value) {
            totals.insert(nutrient.id.clone(), amount);
        }
    }

    totals
}

/// `round(100 * current / target)`, not clamped. A non-positive or
/// non-finite target yields 0.
#[must_use]
pub fn progress_percentage(current: f64, target: f64) -> i64 {
    if !(target.is_finite() && target > 0.0) || !current.is_finite() {
        return 0;
    }
    (100.0 * current / target).round() as i64
}

/// Bar-fill width in percent.
#[must_use]
pub fn display_width(percentage: i64) -> i64 {
    percentage.clamp(0, 100)
}

#[must_use]
pub fn progress_row(
    nutrient_id: &str,
    name: &str,
    unit: &str,
    current: f64,
    target: f64,
) -> ProgressRow {
    let percentage = progress_percentage(current, target);
    ProgressRow {
        nutrient_id: nutrient_id.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        current,
        target,
        percentage,
        display_width: display_width(percentage),
        status: ProgressStatus::from_percentage(percentage),
    }
}

fn total_for(totals: &BTreeMap<String, f64>, nutrient_id: &str) -> f64 {
    let key = normalize_key(nutrient_id);
    totals
        .iter()
        .find(|(k, _)| normalize_key(k) == key)
        .map_or(0.0, |(_, v)| *v)
}

/// The "all nutrients" view: every catalog nutrient against its recommended
/// daily amount, in catalog order.
#[must_use]
pub fn catalog_progress(
    totals: &BTreeMap<String, f64>,
    catalog: &NutrientCatalog,
) -> Vec<ProgressRow> {
    catalog
        .iter()
        .map(|n| {
            progress_row(
                &n.id,
                &n.name,
                &n.unit,
                total_for(totals, &n.id),
                n.recommended_daily,
            )
        })
        .collect()
}

/// The "custom goals" view: tracked nutrients against their custom targets,
/// in registry order.
#[must_use]
pub fn goal_progress(totals: &BTreeMap<String, f64>, goals: &[GoalEntry]) -> Vec<ProgressRow> {
    goals
        .iter()
        .map(|g| {
            progress_row(
                &g.nutrient_id,
                &g.name,
                &g.unit,
                total_for(totals, &g.nutrient_id),
                g.max_value,
            )
        })
        .collect()
}

/// Mean of per-nutrient percentages (each capped at 100) over the nutrients
/// present in `totals`. 0 when nothing has been logged.
#[must_use]
pub fn overall_health(totals: &BTreeMap<String, f64>, catalog: &NutrientCatalog) -> f64 {
    let percentages: Vec<f64> = totals
        .iter()
        .filter_map(|(id, amount)| {
            let n = catalog.find(id)?;
            Some((amount / n.recommended_daily * 100.0).min(100.0))
        })
        .collect();

    if percentages.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = percentages.len() as f64;
    percentages.iter().sum::<f64>() / count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Nutrient, NutrientCategory};
    use chrono::TimeZone;

    fn utc() -> DayBoundary {
        DayBoundary::from_offset("UTC").unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(nutrient_id: &str, amount: f64, ts: DateTime<Utc>) -> LogEntry {
        LogEntry {
            id: format!("{}-{nutrient_id}", ts.timestamp_millis()),
            nutrient_id: nutrient_id.to_string(),
            name: String::new(),
            amount,
            unit: String::new(),
            timestamp: ts,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn iron_catalog() -> NutrientCatalog {
        NutrientCatalog::new(vec![Nutrient {
            id: "iron".to_string(),
            name: "Iron".to_string(),
            category: NutrientCategory::Mineral,
            unit: "mg".to_string(),
            recommended_daily: 18.0,
            description: String::new(),
        }])
        .unwrap()
    }

    #[test]
    fn test_scenario_a_normal() {
        let logs = vec![
            entry("iron", 5.0, at(2024, 6, 15, 8)),
            entry("iron", 8.0, at(2024, 6, 15, 19)),
        ];
        let total = daily_total(&logs, "iron", day(2024, 6, 15), utc());
        assert!((total - 13.0).abs() < f64::EPSILON);
        let pct = progress_percentage(total, 18.0);
        assert_eq!(pct, 72);
        assert_eq!(ProgressStatus::from_percentage(pct), ProgressStatus::Normal);
    }

    #[test]
    fn test_scenario_b_exceeded() {
        let logs = vec![entry("iron", 20.0, at(2024, 6, 15, 12))];
        let total = daily_total(&logs, "iron", day(2024, 6, 15), utc());
        let pct = progress_percentage(total, 18.0);
        assert_eq!(pct, 111);
        assert_eq!(
            ProgressStatus::from_percentage(pct),
            ProgressStatus::Exceeded
        );
        assert_eq!(display_width(pct), 100);
    }

    #[test]
    fn test_daily_total_excludes_other_days() {
        let logs = vec![
            entry("iron", 5.0, at(2024, 6, 14, 23)),
            entry("iron", 3.0, at(2024, 6, 15, 0)),
            entry("iron", 4.0, at(2024, 6, 16, 0)),
            entry("zinc", 9.0, at(2024, 6, 15, 10)),
        ];
        let total = daily_total(&logs, "iron", day(2024, 6, 15), utc());
        assert!((total - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_daily_total_empty_is_zero() {
        assert!(daily_total(&[], "iron", day(2024, 6, 15), utc()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_daily_total_case_insensitive() {
        let logs = vec![
            entry("Iron", 2.0, at(2024, 6, 15, 9)),
            entry("iron", 1.0, at(2024, 6, 15, 10)),
        ];
        let total = daily_total(&logs, "IRON", day(2024, 6, 15), utc());
        assert!((total - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_daily_total_bad_amounts_count_as_zero() {
        let logs = vec![
            entry("iron", f64::NAN, at(2024, 6, 15, 9)),
            entry("iron", -4.0, at(2024, 6, 15, 10)),
            entry("iron", 6.0, at(2024, 6, 15, 11)),
        ];
        let total = daily_total(&logs, "iron", day(2024, 6, 15), utc());
        assert!((total - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fixed_offset_moves_day_boundary() {
        // 23:30 UTC on the 14th is already the 15th at +02:00
        let ts = Utc.with_ymd_and_hms(2024, 6, 14, 23, 30, 0).unwrap();
        let logs = vec![entry("iron", 5.0, ts)];
        let plus_two = DayBoundary::from_offset("+02:00").unwrap();
        assert!((daily_total(&logs, "iron", day(2024, 6, 15), plus_two) - 5.0).abs() < 1e-9);
        assert!(daily_total(&logs, "iron", day(2024, 6, 15), utc()).abs() < 1e-9);
    }

    #[test]
    fn test_from_offset_invalid() {
        assert!(DayBoundary::from_offset("tomorrow").is_err());
        assert_eq!(
            DayBoundary::from_offset("Z").unwrap(),
            DayBoundary::from_offset("+00:00").unwrap()
        );
    }

    #[test]
    fn test_progress_percentage_edges() {
        assert_eq!(progress_percentage(0.0, 18.0), 0);
        assert_eq!(progress_percentage(0.0, 1.0), 0);
        assert_eq!(progress_percentage(10.0, 0.0), 0);
        assert_eq!(progress_percentage(10.0, -5.0), 0);
        assert_eq!(progress_percentage(10.0, f64::NAN), 0);
        assert_eq!(progress_percentage(300.0, 100.0), 300);
    }

    #[test]
    fn test_display_width_clamps() {
        assert_eq!(display_width(111), 100);
        assert_eq!(display_width(72), 72);
        assert_eq!(display_width(-3), 0);
    }

    #[test]
    fn test_scenario_d_aggregate_all() {
        let catalog = NutrientCatalog::new(vec![
            Nutrient {
                id: "protein".to_string(),
                name: "Protein".to_string(),
                category: NutrientCategory::Macro,
                unit: "g".to_string(),
                recommended_daily: 56.0,
                description: String::new(),
            },
            Nutrient {
                id: "fiber".to_string(),
                name: "Fiber".to_string(),
                category: NutrientCategory::Macro,
                unit: "g".to_string(),
                recommended_daily: 28.0,
                description: String::new(),
            },
        ])
        .unwrap();
        let logs = vec![
            entry("protein", 10.0, at(2024, 6, 15, 8)),
            entry("protein", 20.0, at(2024, 6, 15, 12)),
        ];
        let mut scalars = BTreeMap::new();
        scalars.insert("fiber".to_string(), serde_json::json!(12));

        let result = aggregate_all(&logs, &scalars, &catalog, day(2024, 6, 15), utc());
        assert_eq!(result.len(), 2);
        assert!((result["protein"] - 30.0).abs() < f64::EPSILON);
        assert!((result["fiber"] - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_all_logs_win_over_scalars() {
        let catalog = iron_catalog();
        let logs = vec![entry("iron", 4.0, at(2024, 6, 15, 8))];
        let mut scalars = BTreeMap::new();
        scalars.insert("iron".to_string(), serde_json::json!(50));

        let result = aggregate_all(&logs, &scalars, &catalog, day(2024, 6, 15), utc());
        assert!((result["iron"] - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_all_normalizes_and_filters_keys() {
        let catalog = NutrientCatalog::default();
        let mut scalars = BTreeMap::new();
        scalars.insert(" Zinc ".to_string(), serde_json::json!("3.5"));
        scalars.insert("vitamin a".to_string(), serde_json::json!(100));
        scalars.insert("height".to_string(), serde_json::json!("180"));
        scalars.insert("loggedNutrients".to_string(), serde_json::json!([]));
        scalars.insert("iron-goal".to_string(), serde_json::json!(20));
        scalars.insert("calcium".to_string(), serde_json::json!("lots"));

        let result = aggregate_all(&[], &scalars, &catalog, day(2024, 6, 15), utc());
        assert_eq!(result.len(), 2);
        assert!((result["zinc"] - 3.5).abs() < f64::EPSILON);
        assert!((result["vitamin-a"] - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aggregate_all_prefers_id_key_over_name_key() {
        let catalog = NutrientCatalog::default();
        let mut scalars = BTreeMap::new();
        scalars.insert("carbohydrates".to_string(), serde_json::json!(10));
        scalars.insert("carbs".to_string(), serde_json::json!(25));

        let result = aggregate_all(&[], &scalars, &catalog, day(2024, 6, 15), utc());
        assert!((result["carbs"] - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_catalog_progress_covers_every_nutrient() {
        let catalog = NutrientCatalog::default();
        let mut totals = BTreeMap::new();
        totals.insert("iron".to_string(), 9.0);

        let rows = catalog_progress(&totals, &catalog);
        assert_eq!(rows.len(), catalog.len());
        let iron = rows.iter().find(|r| r.nutrient_id == "iron").unwrap();
        assert_eq!(iron.percentage, 50);
        assert_eq!(iron.status, ProgressStatus::Normal);
        let zinc = rows.iter().find(|r| r.nutrient_id == "zinc").unwrap();
        assert_eq!(zinc.percentage, 0);
    }

    #[test]
    fn test_goal_progress_uses_custom_target() {
        let goals = vec![GoalEntry {
            nutrient_id: "iron".to_string(),
            name: "Iron".to_string(),
            unit: "mg".to_string(),
            max_value: 10.0,
        }];
        let mut totals = BTreeMap::new();
        totals.insert("iron".to_string(), 9.0);

        let rows = goal_progress(&totals, &goals);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].percentage, 90);
        assert_eq!(rows[0].status, ProgressStatus::NearComplete);
        assert_eq!(rows[0].display_width, 90);
    }

    #[test]
    fn test_overall_health() {
        let catalog = NutrientCatalog::default();
        assert!(overall_health(&BTreeMap::new(), &catalog).abs() < f64::EPSILON);

        let mut totals = BTreeMap::new();
        // 36 / 18 = 200%, capped at 100
        totals.insert("iron".to_string(), 36.0);
        // 28 / 56 = 50%
        totals.insert("protein".to_string(), 28.0);
        totals.insert("unknown".to_string(), 5.0);
        let health = overall_health(&totals, &catalog);
        assert!((health - 75.0).abs() < 1e-9);
    }
}
