use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use nutrack_core::models::{Height, LengthUnit, MassUnit, UserProfile, Weight};
use nutrack_core::service::NutrientService;

use super::helpers::format_amount;

const CM_PER_IN: f64 = 2.54;
const LBS_PER_KG: f64 = 2.20462;

/// Fields that were not given keep their stored value.
pub(crate) struct ProfileUpdate {
    pub sex: Option<String>,
    pub height: Option<f64>,
    pub height_unit: String,
    pub weight: Option<f64>,
    pub weight_unit: String,
    pub dob: Option<String>,
}

fn apply_update(mut profile: UserProfile, update: ProfileUpdate) -> Result<UserProfile> {
    if let Some(sex) = update.sex {
        let sex = sex.trim().to_lowercase();
        if sex.is_empty() {
            bail!("Sex must not be empty");
        }
        profile.sex = Some(sex);
    }
    if let Some(value) = update.height {
        let unit: LengthUnit = update.height_unit.parse()?;
        profile.height = Some(Height { value, unit });
    }
    if let Some(value) = update.weight {
        let unit: MassUnit = update.weight_unit.parse()?;
        profile.weight = Some(Weight { value, unit });
    }
    if let Some(dob) = update.dob {
        let date = NaiveDate::parse_from_str(&dob, "%Y-%m-%d")
            .with_context(|| format!("Invalid date of birth '{dob}'. Use YYYY-MM-DD"))?;
        profile.date_of_birth = Some(date);
    }
    Ok(profile)
}

pub(crate) fn cmd_profile_set(
    service: &NutrientService,
    update: ProfileUpdate,
    json: bool,
) -> Result<()> {
    let profile = apply_update(service.profile()?, update)?;
    service.set_profile(&profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Profile saved");
        print_profile(&profile, service.today());
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(service: &NutrientService, json: bool) -> Result<()> {
    let profile = service.profile()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else if profile == UserProfile::default() {
        eprintln!("No profile set. Use `nutrack profile set` to add your body metrics.");
    } else {
        print_profile(&profile, service.today());
    }
    Ok(())
}

fn print_profile(profile: &UserProfile, today: NaiveDate) {
    let unset = || "-".to_string();

    let sex = profile.sex.clone().unwrap_or_else(unset);
    let age = profile
        .age_on(today)
        .map_or_else(unset, |a| a.to_string());
    let height = profile.height.map_or_else(unset, |h| match h.unit {
        LengthUnit::Cm => format!("{} cm", format_amount(h.value)),
        LengthUnit::In => format!(
            "{} in ({} cm)",
            format_amount(h.value),
            format_amount(h.value * CM_PER_IN)
        ),
    });
    let weight = profile.weight.map_or_else(unset, |w| match w.unit {
        MassUnit::Kg => format!(
            "{} kg ({} lbs)",
            format_amount(w.value),
            format_amount(w.value * LBS_PER_KG)
        ),
        MassUnit::Lb => format!("{} lb", format_amount(w.value)),
    });

    println!("  Sex:    {sex}");
    println!("  Age:    {age}");
    println!("  Height: {height}");
    println!("  Weight: {weight}");
}
