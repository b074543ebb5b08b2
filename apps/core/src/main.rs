// TalkMate Backend Entry Point
// Line-oriented companion REPL over the supervisor actor

mod actors;
mod brain;
mod character;
mod composer;
mod config;
mod error;
mod fs_manager;
mod logging;
mod models;
mod preflight;
mod prompt;
mod resources;
mod turn_log;

#[cfg(test)]
mod tests;

use actors::supervisor::SupervisorHandle;
use anyhow::{bail, Context};
use config::AppConfig;
use fs_manager::PortablePathManager;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const RULE: &str = "============================================================";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Exit,
    Clear,
    Stats,
    Empty,
    Message(String),
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "" => Command::Empty,
        "exit" | "quit" | "bye" => Command::Exit,
        "clear" => Command::Clear,
        "stats" => Command::Stats,
        _ => Command::Message(trimmed.to_string()),
    }
}

fn prompt_user(user_name: &str) {
    print!("{}: ", user_name);
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    logging::init_tracing(config.log_format)?;

    if let Err(e) = PortablePathManager::init() {
        error!("Failed to initialize portable file system: {}", e);
    }

    let (report, assets) = preflight::run_preflight_checks(&config).await;
    let Some(assets) = assets else {
        let reason = report
            .first_critical_failure()
            .map(|c| format!("{}: {}", c.message, c.details.clone().unwrap_or_default()))
            .unwrap_or_else(|| report.summary.clone());
        bail!("Preflight failed. {}", reason);
    };

    let character = assets.character.clone();
    let supervisor = SupervisorHandle::start(&config, assets.analyzer, assets.character)?;
    info!("Session {} ready", config.session_id);

    println!("{}", RULE);
    println!("  {} is ready to talk!", character.name);
    println!("{}", RULE);
    println!();
    println!("{}: {}", character.name, character.greeting);
    println!();
    println!("Type 'exit' or 'quit' to end the conversation.");
    println!("Type 'clear' to see the greeting again, 'stats' for your stress statistics.");
    println!("{}", "-".repeat(RULE.len()));
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_user(&config.user_name);

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n\n{}: Interrupted. Shutting down.", character.name);
                break;
            }
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Exit => {
                println!("\n{}: Until next time.", character.name);
                break;
            }
            Command::Clear => {
                println!("\n{}", RULE);
                println!("{}: {}", character.name, character.greeting);
                println!("{}\n", RULE);
            }
            Command::Stats => match supervisor.statistics().await {
                Ok(stats) => println!("\n{}\n", stats.render()),
                Err(e) => println!("\nCould not load statistics: {}\n", e),
            },
            Command::Message(message) => {
                match supervisor
                    .process_message(config.session_id.clone(), message)
                    .await
                {
                    Ok(outcome) => println!("\n{}: {}\n", character.name, outcome.text),
                    Err(e) => {
                        error!("Turn failed: {}", e);
                        println!("\nError: {}\nContinuing...\n", e);
                    }
                }
            }
        }
    }

    if let Err(e) = supervisor.end_session(config.session_id.clone()).await {
        error!("Failed to end session {}: {}", config.session_id, e);
    }
    supervisor.shutdown().await;
    Ok(())
}
