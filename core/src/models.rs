use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NutrientCategory {
    Vitamin,
    Mineral,
    Macro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutrient {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub category: NutrientCategory,
    pub unit: String,
    pub recommended_daily: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub nutrient_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

/// A user-defined target for one nutrient. Serialized with the same shape as
/// the `visibleNutrients` list (`id`, `name`, `unit`, `maxValue`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalEntry {
    #[serde(rename = "id")]
    pub nutrient_id: String,
    pub name: String,
    pub unit: String,
    pub max_value: f64,
}

// --- Progress types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStatus {
    Normal,
    NearComplete,
    Exceeded,
}

impl ProgressStatus {
    #[must_use]
    pub fn from_percentage(percentage: i64) -> Self {
        if percentage > 100 {
            Self::Exceeded
        } else if percentage >= 80 {
            Self::NearComplete
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
}

impl Mood {
    #[must_use]
    pub fn from_health(health: f64) -> Self {
        if health >= 70.0 {
            Self::Happy
        } else if health >= 40.0 {
            Self::Neutral
        } else {
            Self::Sad
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRow {
    pub nutrient_id: String,
    pub name: String,
    pub unit: String,
    pub current: f64,
    pub target: f64,
    pub percentage: i64,
    pub display_width: i64,
    pub status: ProgressStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    pub date: String,
    pub nutrients: Vec<ProgressRow>,
    pub goals: Vec<ProgressRow>,
    pub overall_health: f64,
    pub mood: Mood,
}

// --- User profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Cm,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MassUnit {
    Kg,
    Lb,
}

impl FromStr for LengthUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cm" => Ok(Self::Cm),
            "in" | "inch" | "inches" => Ok(Self::In),
            _ => Err(ValidationError::InvalidUnit(s.to_string())),
        }
    }
}

impl FromStr for MassUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kg" => Ok(Self::Kg),
            "lb" | "lbs" => Ok(Self::Lb),
            _ => Err(ValidationError::InvalidUnit(s.to_string())),
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cm => "cm",
            Self::In => "in",
        })
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kg => "kg",
            Self::Lb => "lb",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Height {
    pub value: f64,
    pub unit: LengthUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub value: f64,
    pub unit: MassUnit,
}

/// Body metrics used to compose the AI goal prompt. Height and weight carry
/// their unit so values are never interpreted in the wrong system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<Height>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Weight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
}

impl UserProfile {
    #[must_use]
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| today.years_since(dob))
    }
}

// --- Validation ---

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown nutrient '{0}'")]
    UnknownNutrient(String),
    #[error("Amount must be a finite number of at least 0 (got {0})")]
    InvalidAmount(f64),
    #[error("Goal value must be a finite number greater than 0 (got {0})")]
    InvalidGoal(f64),
    #[error("Profile is missing {0}")]
    IncompleteProfile(&'static str),
    #[error("Invalid {0}: must be a finite number greater than 0")]
    InvalidMeasurement(&'static str),
    #[error("Unknown unit '{0}'")]
    InvalidUnit(String),
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

/// Canonical form used to compare nutrient ids and storage keys.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Parse user-entered amount text. Empty or non-numeric input yields `None`.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn validate_amount(amount: f64) -> Result<f64, ValidationError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(ValidationError::InvalidAmount(amount))
    }
}

pub fn validate_goal_value(max_value: f64) -> Result<f64, ValidationError> {
    if max_value.is_finite() && max_value > 0.0 {
        Ok(max_value)
    } else {
        Err(ValidationError::InvalidGoal(max_value))
    }
}

/// Height and weight, when present, must be positive and finite.
pub fn validate_profile(profile: &UserProfile) -> Result<(), ValidationError> {
    if let Some(h) = profile.height {
        if !(h.value.is_finite() && h.value > 0.0) {
            return Err(ValidationError::InvalidMeasurement("height"));
        }
    }
    if let Some(w) = profile.weight {
        if !(w.value.is_finite() && w.value > 0.0) {
            return Err(ValidationError::InvalidMeasurement("weight"));
        }
    }
    Ok(())
}

/// Read a stored amount: numbers and numeric strings count, anything else
/// (including negative or non-finite values) does not.
#[must_use]
pub fn amount_from_value(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(amount_from_value).unwrap_or(0.0))
}
