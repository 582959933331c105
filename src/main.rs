//! # relay
//!
//! Command-line front end: loads settings and credentials, builds the
//! provider chain, and relays messages from stdin or arguments.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

use relay_llm::{FallbackChain, ProviderFactory};
use relay_settings::{load_settings, load_settings_from_path, Credentials, RelaySettings};
use relay_telemetry::{init_telemetry, parse_level, with_bootstrap_logging, TelemetryConfig};

/// Conversational relay across LLM providers.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "Conversational relay across LLM providers")]
struct Cli {
    /// Settings file (defaults to `~/.relay/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session (default). `/reset` clears history, `/search <query>` searches.
    Chat,
    /// Send one message through the fallback chain.
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Send one query straight to the search provider.
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List providers in the order they are tried.
    Providers,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; real env vars still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Logging is configured by the settings, so warnings raised while
    // loading them go to a temporary stderr subscriber.
    let settings = with_bootstrap_logging(|| match &cli.settings {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    })
    .context("failed to load settings")?;

    init_telemetry(&telemetry_config(&settings, cli.json_logs))
        .context("failed to initialize logging")?;

    let credentials = Credentials::from_env();
    let mut chain = ProviderFactory::new(&settings, &credentials)?
        .build_chain()
        .context("cannot start without the mandatory provider")?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&mut chain).await,
        Command::Ask { message } => {
            let reply = chain.send(&message.join(" ")).await?;
            println!("{reply}");
            Ok(())
        }
        Command::Search { query } => {
            let reply = chain.search(&query.join(" ")).await?;
            println!("{reply}");
            Ok(())
        }
        Command::Providers => {
            list_providers(&chain);
            Ok(())
        }
    }
}

fn telemetry_config(settings: &RelaySettings, json_override: bool) -> TelemetryConfig {
    let logging = &settings.logging;
    TelemetryConfig {
        log_level: parse_level(&logging.level).unwrap_or(Level::INFO),
        module_levels: logging
            .modules
            .iter()
            .filter_map(|(module, level)| parse_level(level).map(|l| (module.clone(), l)))
            .collect(),
        json: logging.json || json_override,
    }
}

const CHAT_HINT: &str = "type a message, /search <query>, /reset or /quit";

/// Line-oriented session. Failures are reported and the session continues.
async fn chat(chain: &mut FallbackChain) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tracing::info!("chat session started");

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            println!("{CHAT_HINT}\n");
            continue;
        }

        let outcome = match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit" | "/exit", _) => break,
            ("/reset", _) => {
                chain.reset_all();
                Ok("conversation history cleared".to_string())
            }
            ("/search", "") => Ok("usage: /search <query>".to_string()),
            ("/search", query) => chain.search(query).await.map_err(anyhow::Error::from),
            _ => chain.send(line).await.map_err(anyhow::Error::from),
        };

        match outcome {
            Ok(reply) => println!("{reply}\n"),
            Err(e) => println!("> {line}\n\nno provider could answer: {e}\n"),
        }
    }

    tracing::info!("chat session ended");
    Ok(())
}

fn list_providers(chain: &FallbackChain) {
    let providers: Vec<_> = chain.providers().collect();
    let last = providers.len().saturating_sub(1);
    for (i, p) in providers.iter().enumerate() {
        let marker = if i == last { " (mandatory)" } else { "" };
        println!("{}. {} · {} [{}]{marker}", i + 1, p.name(), p.model(), p.kind());
    }
    match chain.search_provider() {
        Some(p) => println!("search: {} · {}", p.name(), p.model()),
        None => println!("search: unavailable"),
    }
}
