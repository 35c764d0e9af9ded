//! Mode_0 CLI - run the chat bot pipeline from a terminal.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::{Args, Parser, Subcommand};
use mode0_bot::error::{DisplayError, Result};
use mode0_bot::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Mode_0 - Twitch chat bot with persona responses and idle engagement
#[derive(Parser)]
#[command(name = "mode0")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "MODE0_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitArgs),

    /// Run the bot on the console connection until Ctrl+C
    Run(RunArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the run command
#[derive(Args)]
struct RunArgs {
    /// Seed for the decision generator (reproducible runs)
    #[arg(long)]
    seed: Option<u64>,

    /// Disable idle-chat engagement
    #[arg(long)]
    no_idle: bool,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration, defaults included
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration and list warnings
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", DisplayError(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging: `RUST_LOG` wins, then `-v`, then `logging.level`.
///
/// Logs go to stderr so the console connection owns stdout.
fn init_logging(verbosity: u8, configured: Option<&str>) {
    let level = match verbosity {
        0 => configured.unwrap_or("info"),
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("mode0_bot={level},mode0={level},warn"))
            .unwrap_or_else(|_| EnvFilter::new("mode0_bot=info,mode0=info,warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(config_path);

    match cli.command {
        Commands::Init(args) => {
            init_logging(cli.verbose, None);
            cmd_init(args, &path).await
        }
        Commands::Run(args) => {
            let config = load_config_from(&path).await;
            init_logging(
                cli.verbose,
                config.as_ref().ok().map(|c| c.logging.level.as_str()),
            );
            cmd_run(args, config?).await
        }
        Commands::Config(args) => {
            init_logging(cli.verbose, None);
            cmd_config(args, &path).await
        }
    }
}

/// Write a default configuration.
async fn cmd_init(args: InitArgs, path: &Path) -> Result<()> {
    if path.exists() && !args.force {
        println!("Configuration already exists at: {}", path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    save_config(&BotConfig::default(), path).await?;

    println!("Configuration created: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. set twitch.channel and tune engagement rates in the file");
    println!("  2. mode0 config validate");
    println!("  3. mode0 run");

    Ok(())
}

/// Run the bot on the console connection.
async fn cmd_run(args: RunArgs, mut config: BotConfig) -> Result<()> {
    if args.seed.is_some() {
        config.engagement.seed = args.seed;
    }
    if args.no_idle {
        config.bot.auto_engage = false;
    }

    let chat = Arc::new(ConsoleChat::new(config.channel(), config.bot.name.clone()));

    println!(
        "{} is listening on #{}. Type `name: message` to chat, Ctrl+C to stop.\n",
        config.bot.name,
        config.channel()
    );

    Bot::new(config, chat).await?.run().await
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, path: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            let config = load_config_from(path).await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Validate => {
            if !path.exists() {
                println!("warning: {} does not exist, checking defaults", path.display());
            }
            let config = load_config_from(path).await?;
            let issues = config.validate();
            for issue in &issues {
                let label = match issue.level {
                    IssueLevel::Error => "error",
                    IssueLevel::Warning => "warning",
                };
                println!("{label}: {issue}");
            }
            println!("Configuration is valid");
        }
    }

    Ok(())
}
