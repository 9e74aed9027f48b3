//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use docgen_core::config;
use docgen_core::controller::Controller;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "docgen")]
#[command(version)]
#[command(about = "Generate repository documentation and publish it to Confluence")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the documentation backend URL
    #[arg(long, global = true, value_name = "URL")]
    backend_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Log in with GitHub (opens the browser)
    Login,

    /// Link a Confluence (Atlassian) account (opens the browser)
    LinkConfluence,

    /// Complete a login from a redirect URL, query string or code
    Callback {
        /// Redirect URL, `?code=...&state=...`, or the bare code
        #[arg(value_name = "REDIRECT")]
        input: String,

        /// Treat a bare code as a Confluence code
        #[arg(long)]
        confluence: bool,
    },

    /// Forget every stored token
    Logout,

    /// Show which accounts are linked
    Status,

    /// Fetch (or generate) documentation for a repository
    Fetch {
        /// Repository as owner/name
        #[arg(value_name = "OWNER/NAME")]
        repo: String,

        /// Write the document to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Push the result to Confluence afterwards
        #[arg(long)]
        push: bool,

        /// Register the regeneration webhook afterwards
        #[arg(long)]
        webhook: bool,
    },

    /// Push generated documentation to the linked Confluence site
    Push {
        /// Repository as owner/name
        #[arg(value_name = "OWNER/NAME")]
        repo: String,

        /// Commit the document was generated from
        #[arg(long, value_name = "HASH")]
        commit: Option<String>,
    },

    /// Register the regeneration webhook on a repository
    Webhook {
        /// Repository as owner/name
        #[arg(value_name = "OWNER/NAME")]
        repo: String,
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

    init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

/// Logs go to stderr so stdout stays usable for documents.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("DOCGEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn controller(backend_url: Option<String>) -> Result<Controller> {
    let mut config = config::Config::load().context("load config")?;
    if let Some(url) = backend_url {
        config.backend_url = url;
    }
    Controller::from_config(config).context("load session")
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        command,
        backend_url,
    } = cli;

    match command {
        Commands::Login => commands::auth::login_github(&controller(backend_url)?).await,
        Commands::LinkConfluence => {
            commands::auth::link_confluence(&controller(backend_url)?).await
        }
        Commands::Callback { input, confluence } => {
            commands::auth::callback(&controller(backend_url)?, &input, confluence).await
        }
        Commands::Logout => commands::auth::logout(&controller(backend_url)?),
        Commands::Status => {
            commands::auth::status(&controller(backend_url)?);
            Ok(())
        }
        Commands::Fetch {
            repo,
            output,
            push,
            webhook,
        } => {
            let opts = commands::docs::FetchOptions {
                output,
                push,
                webhook,
            };
            commands::docs::fetch(&controller(backend_url)?, &repo, &opts).await
        }
        Commands::Push { repo, commit } => {
            commands::docs::push(&controller(backend_url)?, &repo, commit.as_deref()).await
        }
        Commands::Webhook { repo } => {
            commands::docs::webhook(&controller(backend_url)?, &repo).await
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
