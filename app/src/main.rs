//! `trackhound` command-line interface.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trackhound_app::{init_tracing, Controller};
use trackhound_core::{AppConfig, ExtensionId};
use trackhound_extension::{Event, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "trackhound", version, about = "Find newly released tracks")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory scanned for extensions
    #[arg(long, global = true)]
    extensions_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover extensions and show their flags
    List,
    /// Discover extensions, then scrape the enabled ones
    Scrape {
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Enable an extension, or some of its genres
    Enable {
        /// Extension identity
        id: String,
        /// Genres to enable instead of the extension itself
        #[arg(long = "genre")]
        genres: Vec<String>,
    },
    /// Disable an extension, or some of its genres
    Disable {
        /// Extension identity
        id: String,
        /// Genres to disable instead of the extension itself
        #[arg(long = "genre")]
        genres: Vec<String>,
    },
    /// Show the cutoff date, or set it
    Cutoff {
        /// New cutoff (YYYY-MM-DD)
        date: Option<NaiveDate>,
    },
    /// Remove cached HTTP responses
    ClearCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::config_path()?,
    };
    let mut config = AppConfig::load_from(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.apply_env();
    if let Some(dir) = cli.extensions_dir {
        config.general.extensions_dir = Some(dir);
    }

    let mut controller = Controller::new(config, config_path)?;

    match cli.command {
        Command::List => {
            discover(&mut controller).await?;
            for record in controller.registry() {
                let flag = if record.enabled { "x" } else { " " };
                println!("[{flag}] {} ({}) {}", record.id, record.name, record.version);
                for (genre, enabled) in record.genres() {
                    let flag = if *enabled { "x" } else { " " };
                    println!("      [{flag}] {genre}");
                }
            }
        }
        Command::Scrape { json } => {
            discover(&mut controller).await?;
            scrape(&mut controller, json).await?;
        }
        Command::Enable { id, genres } => set_flags(&mut controller, &id, &genres, true).await?,
        Command::Disable { id, genres } => set_flags(&mut controller, &id, &genres, false).await?,
        Command::Cutoff { date } => {
            if let Some(date) = date {
                controller.set_cutoff(date)?;
                controller.save_config()?;
            }
            println!("{}", controller.cutoff());
        }
        Command::ClearCache => controller.clear_cache().await?,
    }

    Ok(())
}

fn print_log(event: &Event) {
    if let Event::Log(line) = event {
        eprintln!("{line}");
    }
}

async fn discover(controller: &mut Controller) -> anyhow::Result<()> {
    controller.start_discovery()?;
    controller.run_until_idle(print_log).await;
    Ok(())
}

async fn scrape(controller: &mut Controller, json: bool) -> anyhow::Result<()> {
    if controller.registry().enabled().next().is_none() {
        eprintln!("No extensions enabled. Use `trackhound enable <id>` first.");
        return Ok(());
    }

    controller.start_scrape()?;

    let mut found = 0_usize;
    let mut outcome = None;

    loop {
        tokio::select! {
            event = controller.next_event() => {
                let Some(event) = event else { break };
                match &event {
                    Event::ResultFound { item, source } => {
                        found += 1;
                        if json {
                            println!("{}", serde_json::to_string(item)?);
                        } else {
                            println!(
                                "{} - {} [{}] ({source}) {}",
                                item.artist(),
                                item.name(),
                                item.genre(),
                                item.media_url()
                            );
                        }
                    }
                    Event::RunFinished { outcome: finished } => {
                        outcome = Some(*finished);
                        break;
                    }
                    other => print_log(other),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Cancelling after the current extension...");
                controller.cancel();
            }
        }
    }

    match outcome {
        Some(RunOutcome::Completed) => eprintln!("Found {found} new tracks."),
        Some(RunOutcome::Cancelled) => eprintln!("Cancelled after {found} tracks."),
        None => bail!("scrape ended without finishing"),
    }
    Ok(())
}

async fn set_flags(
    controller: &mut Controller,
    id: &str,
    genres: &[String],
    enabled: bool,
) -> anyhow::Result<()> {
    let id = ExtensionId::new(id)?;
    discover(controller).await?;

    if genres.is_empty() {
        controller.set_enabled(&id, enabled)?;
    } else {
        for genre in genres {
            controller.set_genre_enabled(&id, genre, enabled)?;
        }
    }

    controller.save_config()?;
    Ok(())
}
