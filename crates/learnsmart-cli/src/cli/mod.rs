//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use learnsmart_core::backend::BackendConfig;
use learnsmart_core::render::RenderPolicy;
use learnsmart_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "learnsmart")]
#[command(version)]
#[command(about = "Stream LearnSmart answers as sanitized HTML")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides config and LEARNSMART_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Bearer token sent to the backend (overrides config)
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    /// Verbose logging and raw stream capture
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sends one prompt and prints the rendered answer
    Ask {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Print the raw markdown instead of HTML
        #[arg(long)]
        raw: bool,

        /// Render policy (whole_buffer, incremental)
        #[arg(long, value_name = "POLICY")]
        policy: Option<String>,

        /// Write the answer to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Reads prompts from stdin, one per line (`:q` quits)
    Chat {
        /// Render policy (whole_buffer, incremental)
        #[arg(long, value_name = "POLICY")]
        policy: Option<String>,
    },

    /// Renders a markdown file offline, feeding it in chunks
    Render {
        /// Bytes per chunk fed to the decoder
        #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u64).range(1..))]
        chunk_size: u64,

        /// Render policy (whole_buffer, incremental)
        #[arg(long, value_name = "POLICY")]
        policy: Option<String>,

        /// Markdown file (stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::Config::load().context("load config")?;
    if cli.debug {
        config.debug = true;
    }
    if let Some(token) = cli.token.as_deref() {
        config.token = Some(token.to_string());
    }

    let _log_guard = logging::init(&logging::LogOptions::from(&config)).context("init logging")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli, config).await })
}

async fn dispatch(cli: Cli, mut config: config::Config) -> Result<()> {
    let Cli {
        command, base_url, ..
    } = cli;

    match command {
        Commands::Ask {
            prompt,
            raw,
            policy,
            output,
        } => {
            apply_policy(&mut config, policy.as_deref())?;
            let backend = backend_config(&config, base_url.as_deref())?;
            commands::ask::run(commands::ask::AskOptions {
                prompt: &prompt,
                config: &config,
                backend,
                raw,
                output: output.as_deref(),
            })
            .await
        }
        Commands::Chat { policy } => {
            apply_policy(&mut config, policy.as_deref())?;
            let backend = backend_config(&config, base_url.as_deref())?;
            commands::chat::run(&config, backend).await
        }
        Commands::Render {
            chunk_size,
            policy,
            file,
        } => {
            apply_policy(&mut config, policy.as_deref())?;
            let chunk_size = usize::try_from(chunk_size).unwrap_or(usize::MAX);
            commands::render::run(file.as_deref(), chunk_size, config.render_policy).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}

fn apply_policy(config: &mut config::Config, policy: Option<&str>) -> Result<()> {
    if let Some(raw) = policy {
        config.render_policy = parse_policy(raw)?;
    }
    Ok(())
}

fn parse_policy(raw: &str) -> Result<RenderPolicy> {
    RenderPolicy::from_id(raw).with_context(|| {
        format!("Invalid render policy '{raw}'. Valid options: whole_buffer, incremental")
    })
}

/// Resolves the backend settings; a `--base-url` flag beats env and config.
fn backend_config(config: &config::Config, base_url: Option<&str>) -> Result<BackendConfig> {
    let mut backend = BackendConfig::from_config(config)?;
    if let Some(base) = base_url.map(str::trim).filter(|b| !b.is_empty()) {
        url::Url::parse(base).with_context(|| format!("Invalid --base-url: {base}"))?;
        backend.endpoint_url = config.endpoint_url_for(base);
    }
    Ok(backend)
}
