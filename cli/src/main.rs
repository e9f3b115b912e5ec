mod commands;
mod config;
mod openai;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{
    ProfileUpdate, cmd_advise, cmd_advise_show, cmd_clear, cmd_goal_list, cmd_goal_remove,
    cmd_goal_set, cmd_history, cmd_log, cmd_logs, cmd_nutrients, cmd_profile_set,
    cmd_profile_show, cmd_summary,
};
use crate::config::Config;
use crate::openai::OpenAiClient;
use nutrack_core::service::NutrientService;

#[derive(Parser)]
#[command(
    name = "nutrack",
    version,
    about = "A simple nutrient intake tracker CLI",
    long_about = "Log vitamins, minerals and macros, track them against recommended \
                  daily amounts or your own goals, and ask an AI advisor for targets.\n\n\
                  Set NUTRACK_UTC_OFFSET (e.g. +02:00) to pin the day boundary to a fixed \
                  offset instead of the local timezone."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the nutrients that can be logged
    Nutrients {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log an amount of a nutrient
    Log {
        /// Nutrient ID or name (e.g. "iron", "vitamin-c")
        nutrient: String,
        /// Amount in the nutrient's unit (see `nutrack nutrients`)
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List log entries for a day (defaults to today)
    Logs {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily progress (defaults to today)
    Summary {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Only show custom goals
        #[arg(long)]
        goals: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show overall health for the last N days
    History {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage custom nutrient goals
    Goal {
        #[command(subcommand)]
        command: GoalCommands,
    },
    /// Manage body metrics used by the AI advisor
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Ask the AI advisor for recommended daily amounts (needs OPENAI_API_KEY)
    Advise {
        /// Show the last stored recommendation instead of requesting a new one
        #[arg(long)]
        show: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear log history and running totals
    Clear {
        /// Also remove goals, profile and the stored AI recommendation
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum GoalCommands {
    /// Set (or replace) the daily goal for a nutrient
    Set {
        /// Nutrient ID
        nutrient: String,
        /// Daily goal amount in the nutrient's unit
        amount: f64,
        /// Display name, for nutrients outside the built-in list (requires --unit)
        #[arg(long)]
        name: Option<String>,
        /// Unit, for nutrients outside the built-in list (requires --name)
        #[arg(long)]
        unit: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stop tracking a nutrient
    Remove {
        /// Nutrient ID
        nutrient: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show all goals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Update body metrics; omitted fields keep their stored value
    Set {
        /// Sex (e.g. female, male)
        #[arg(long)]
        sex: Option<String>,
        /// Height value
        #[arg(long)]
        height: Option<f64>,
        /// Height unit: cm or in
        #[arg(long, default_value = "cm")]
        height_unit: String,
        /// Weight value
        #[arg(long)]
        weight: Option<f64>,
        /// Weight unit: kg or lb
        #[arg(long, default_value = "kg")]
        weight_unit: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show body metrics
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if matches!(cli.command, Commands::Serve { .. }) {
        "nutrack=info,nutrack_core=info"
    } else {
        "warn"
    };
    init_tracing(default_filter);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let service = NutrientService::open(&config.db_path)?.with_day_boundary(config.day_boundary);

    match cli.command {
        Commands::Nutrients { json } => cmd_nutrients(&service, json),
        Commands::Log {
            nutrient,
            amount,
            json,
        } => cmd_log(&service, &nutrient, &amount, json),
        Commands::Logs { date, json } => cmd_logs(&service, date, json),
        Commands::Summary { date, goals, json } => cmd_summary(&service, date, goals, json),
        Commands::History { days, json } => cmd_history(&service, days, json),
        Commands::Goal { command } => match command {
            GoalCommands::Set {
                nutrient,
                amount,
                name,
                unit,
                json,
            } => cmd_goal_set(&service, &nutrient, amount, name, unit, json),
            GoalCommands::Remove { nutrient, json } => cmd_goal_remove(&service, &nutrient, json),
            GoalCommands::List { json } => cmd_goal_list(&service, json),
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Set {
                sex,
                height,
                height_unit,
                weight,
                weight_unit,
                dob,
                json,
            } => cmd_profile_set(
                &service,
                ProfileUpdate {
                    sex,
                    height,
                    height_unit,
                    weight,
                    weight_unit,
                    dob,
                },
                json,
            ),
            ProfileCommands::Show { json } => cmd_profile_show(&service, json),
        },
        Commands::Advise { show: true, json } => cmd_advise_show(&service, json),
        Commands::Advise { show: false, json } => cmd_advise(&service, &config, json).await,
        Commands::Clear { all, json } => cmd_clear(&service, all, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let advisor = if config.openai_api_key.is_some() {
                Some(OpenAiClient::from_config(&config)?)
            } else {
                None
            };
            server::start_server(service, advisor, port, &bind, api_key).await
        }
    }
}
