//! Prompt composition and wire types for the AI goal advisor.
//!
//! The HTTP call itself lives with the caller; this module only builds the
//! request body and pulls the recommendation text out of the response.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{UserProfile, ValidationError};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const MAX_TOKENS: u32 = 150;
pub const TEMPERATURE: f32 = 0.5;

pub const SYSTEM_PROMPT: &str = "You are a supportive nutrition coach focused on micronutrient intake. \
Given a user's age, sex, height, weight, and what they have logged today, \
list a recommended daily intake for each nutrient mentioned, one per line as \
'<nutrient>: <amount> <unit>', then give one or two short suggestions for \
foods that would close the largest gaps.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    pub content: Option<String>,
}

/// Compose the user prompt from body metrics and today's totals.
pub fn build_prompt(
    profile: &UserProfile,
    totals: &BTreeMap<String, f64>,
    today: NaiveDate,
) -> Result<String, ValidationError> {
    let age = profile
        .age_on(today)
        .ok_or(ValidationError::IncompleteProfile("date of birth"))?;
    let sex = profile
        .sex
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::IncompleteProfile("sex"))?;
    let height = profile
        .height
        .ok_or(ValidationError::IncompleteProfile("height"))?;
    let weight = profile
        .weight
        .ok_or(ValidationError::IncompleteProfile("weight"))?;

    let mut prompt = format!(
        "I'm {age} years old, {sex}, weigh {} {}, and have a height of {} {}. \
         My current nutrient intake today is the following:\n",
        weight.value, weight.unit, height.value, height.unit
    );
    prompt.push_str(&intake_summary(totals));
    Ok(prompt)
}

/// One `nutrientId: total` line per nutrient.
#[must_use]
pub fn intake_summary(totals: &BTreeMap<String, f64>) -> String {
    let mut out = String::new();
    for (i, (id, total)) in totals.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{id}: {total}");
    }
    out
}

#[must_use]
pub fn chat_request(model: &str, prompt: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ],
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// Text of the first choice, if it has any non-blank content.
#[must_use]
pub fn response_text(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()?
        .message
        .content
        .filter(|c| !c.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Height, LengthUnit, MassUnit, Weight};

    fn full_profile() -> UserProfile {
        UserProfile {
            sex: Some("male".to_string()),
            height: Some(Height {
                value: 180.0,
                unit: LengthUnit::Cm,
            }),
            weight: Some(Weight {
                value: 180.0,
                unit: MassUnit::Lb,
            }),
            date_of_birth: NaiveDate::from_ymd_opt(2003, 1, 10),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_build_prompt_includes_units_and_summary() {
        let mut totals = BTreeMap::new();
        totals.insert("iron".to_string(), 13.0);
        totals.insert("calcium".to_string(), 400.5);

        let prompt = build_prompt(&full_profile(), &totals, today()).unwrap();
        assert!(prompt.starts_with("I'm 21 years old, male, weigh 180 lb, and have a height of 180 cm."));
        assert!(prompt.ends_with("calcium: 400.5\niron: 13"));
    }

    #[test]
    fn test_build_prompt_requires_complete_profile() {
        let totals = BTreeMap::new();

        let mut p = full_profile();
        p.weight = None;
        assert_eq!(
            build_prompt(&p, &totals, today()),
            Err(ValidationError::IncompleteProfile("weight"))
        );

        let mut p = full_profile();
        p.sex = Some("  ".to_string());
        assert_eq!(
            build_prompt(&p, &totals, today()),
            Err(ValidationError::IncompleteProfile("sex"))
        );

        let mut p = full_profile();
        p.date_of_birth = None;
        assert!(build_prompt(&p, &totals, today()).is_err());
    }

    #[test]
    fn test_intake_summary_empty() {
        assert_eq!(intake_summary(&BTreeMap::new()), "");
    }

    #[test]
    fn test_chat_request_shape() {
        let req = chat_request(DEFAULT_MODEL, "hello");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["max_tokens"], 150);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_response_text() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Iron: 8 mg"}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(resp).as_deref(), Some("Iron: 8 mg"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(response_text(empty).is_none());

        let missing: ChatResponse = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert!(response_text(missing).is_none());

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(response_text(blank).is_none());
    }
}
