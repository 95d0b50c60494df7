//! Task Agent - command-line entry point.
//!
//! Preprocesses the task attachment, runs the agent loop and prints the
//! final answer on stdout. Logs go to stderr.

use std::path::PathBuf;

use clap::Parser;
use task_agent::{agent::Agent, config::Config, preprocess::Preprocessor};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "task-agent", version, about = "Answer a task with a tool-using LLM agent")]
struct Cli {
    /// The question to answer
    task: String,

    /// Attachment file name, resolved under the task data directory
    #[arg(short, long)]
    file: Option<String>,

    /// Model override
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum model/tool round-trips
    #[arg(long)]
    max_round_trips: Option<usize>,

    /// Task data directory override
    #[arg(long)]
    task_data: Option<PathBuf>,

    /// Print every message of the final conversation to stderr
    #[arg(long)]
    transcript: bool,

    /// Print the whole run outcome as JSON instead of the bare answer
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "task_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(model) = cli.model {
        config.default_model = model;
    }
    if let Some(max) = cli.max_round_trips {
        config.max_round_trips = max;
    }
    if let Some(dir) = cli.task_data {
        config.task_data_path = dir;
    }
    info!(
        "Loaded configuration: model={}, max_round_trips={}",
        config.default_model, config.max_round_trips
    );

    let preprocessor = Preprocessor::from_config(&config);
    let task = preprocessor.prepare(&cli.task, cli.file.as_deref()).await;

    let agent = Agent::new(&config)?;
    let outcome = agent.run_task(&task).await?;

    if cli.transcript {
        for msg in &outcome.messages {
            eprintln!("================ {} ================", msg.role.as_str());
            if let Some(content) = &msg.content {
                eprintln!("{}", content);
            }
            for call in msg.requested_calls() {
                eprintln!("-> {} [{}] {}", call.function.name, call.id, call.function.arguments);
            }
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.answer);
    }

    Ok(())
}
