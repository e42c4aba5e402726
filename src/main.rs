use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buildwright::ai::CredentialRole;
use buildwright::cli::CommandContext;
use buildwright::cli::commands::{ask, classify, config, keys};
use buildwright::cli::ui::Output;

#[derive(Parser)]
#[command(name = "buildwright")]
#[command(
    version,
    about = "Resilient backend access and build-failure recovery for generated apps"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Use this config file only")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a build log and suggest a fix
    Classify {
        #[arg(long, short = 'f', help = "Build log file (stdin when omitted)")]
        file: Option<PathBuf>,
        #[arg(
            long,
            default_value = "0",
            help = "Builds already attempted"
        )]
        attempt: u32,
        #[arg(long, default_value = "text", help = "Output format: text, json")]
        format: String,
    },

    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Send a prompt to the generative backend
    Ask {
        #[arg(help = "Prompt text")]
        prompt: String,
        #[arg(long, short, help = "System instruction")]
        system: Option<String>,
        #[arg(long, help = "Enable the configured thinking budget")]
        thinking: bool,
        #[arg(long, help = "Overall timeout in seconds")]
        timeout: Option<u64>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Store the primary key (prompted when omitted)
    SetPrimary {
        key: Option<String>,
        #[arg(long, help = "Skip the key format check")]
        force: bool,
    },
    /// Store the backup key (prompted when omitted)
    SetBackup {
        key: Option<String>,
        #[arg(long, help = "Skip the key format check")]
        force: bool,
    },
    /// Show masked keys and failure counters
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Make the backup key active
    Failover,
    /// Make the primary key active again
    Restore,
    /// Delete all stored keys
    Clear {
        #[arg(long, help = "Confirm deletion")]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mbuildwright encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Output::new().error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // `config init` must work even when the current config is broken
    if let Commands::Config {
        action: ConfigAction::Init { global, force },
    } = cli.command
    {
        config::init(global, force)?;
        return Ok(());
    }

    let ctx = CommandContext::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify {
            file,
            attempt,
            format,
        } => {
            classify::run(&ctx, file.as_deref(), attempt, &format)?;
        }
        Commands::Keys { action } => match action {
            KeysAction::SetPrimary { key, force } => {
                keys::set(&ctx, CredentialRole::Primary, key, force)?
            }
            KeysAction::SetBackup { key, force } => {
                keys::set(&ctx, CredentialRole::Backup, key, force)?
            }
            KeysAction::Status { format } => keys::status(&ctx, &format)?,
            KeysAction::Failover => keys::failover(&ctx)?,
            KeysAction::Restore => keys::restore(&ctx)?,
            KeysAction::Clear { yes } => keys::clear(&ctx, yes)?,
        },
        Commands::Ask {
            prompt,
            system,
            thinking,
            timeout,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(ask::run(
                &ctx,
                &prompt,
                ask::AskOptions {
                    system,
                    thinking,
                    timeout_secs: timeout,
                },
            ))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => config::show(&ctx, &format)?,
            ConfigAction::Path => config::path(&ctx)?,
            ConfigAction::Init { .. } => {}
        },
    }

    Ok(())
}
