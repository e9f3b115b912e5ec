use anyhow::{Result, bail};

use crate::config::Config;
use crate::openai::OpenAiClient;
use nutrack_core::service::NutrientService;

pub(crate) async fn cmd_advise(service: &NutrientService, config: &Config, json: bool) -> Result<()> {
    let client = OpenAiClient::from_config(config)?;
    let prompt = service.prepare_ai_prompt()?;
    let outcome = client.recommend(&prompt).await;

    let Some(goal) = service.record_ai_goal(outcome)? else {
        if let Some(previous) = service.ai_goal()? {
            eprintln!("Keeping previous recommendation:\n{previous}");
        }
        bail!("AI advisor did not return a recommendation");
    };

    if json {
        println!("{}", serde_json::json!({ "goal": goal }));
    } else {
        println!("{goal}");
    }
    Ok(())
}

pub(crate) fn cmd_advise_show(service: &NutrientService, json: bool) -> Result<()> {
    let goal = service.ai_goal()?;

    if json {
        println!("{}", serde_json::json!({ "goal": goal }));
    } else if let Some(goal) = goal {
        println!("{goal}");
    } else {
        eprintln!("No AI recommendation yet. Run `nutrack advise` to request one.");
    }
    Ok(())
}
