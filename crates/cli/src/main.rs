mod auth_commands;
mod secret_commands;
mod session;
mod signal_commands;

use std::{path::PathBuf, process::ExitCode};

use {
    clap::{Parser, Subcommand},
    tracing::{error, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "stetho", about = "Stetho: fetch Withings stethoscope recordings", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: discover stetho.{toml,yaml,yml,json}).
    #[arg(long, global = true, env = "STETHO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a recording and save it as a WAV file.
    Fetch(signal_commands::FetchArgs),
    /// Save every recording into the sound directory.
    DownloadAll(signal_commands::DownloadArgs),
    /// Print the available recordings.
    List(signal_commands::ListArgs),
    /// Credential chain management.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Shared secret management.
    Secret {
        #[command(subcommand)]
        action: secret_commands::SecretAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = session::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Fetch(args) => signal_commands::fetch(&config, args),
        Commands::DownloadAll(args) => signal_commands::download_all(&config, args),
        Commands::List(args) => signal_commands::list(&config, args),
        Commands::Auth { action } => auth_commands::handle_auth(&config, action),
        Commands::Secret { action } => secret_commands::handle_secret(&config, action),
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "stetho starting");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if session::is_secret_unavailable(&e) => {
            error!("{e:#}");
            eprintln!("A shared secret is required. Run `stetho secret set` first.");
            ExitCode::from(2)
        },
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        },
    }
}
