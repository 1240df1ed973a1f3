use anyhow::Context;
use clap::{Parser, Subcommand};
use relay_adaptor_terminal::{run_terminal, TerminalConfig};
use relay_adaptor_web::{RelayServer, RelayServerConfig};
use relay_core::{init_logging, load_env, load_env_from_path, RelayConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Relay for ADK agent servers")]
struct Cli {
    /// Log filter, e.g. `info` or `relay_core=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Environment file to load instead of `./.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay server in front of an ADK server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// ADK server the routes forward to
        #[arg(long)]
        adk_base_url: Option<String>,
        /// Stream scrubbed logs at `/logs`
        #[arg(long)]
        logs: bool,
    },
    /// Chat in this terminal through a running relay
    Chat {
        /// Relay server base URL
        #[arg(long)]
        proxy_url: Option<String>,
        /// Bearer token for a relay with auth enabled
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => load_env_from_path(path)?,
        None => load_env()?,
    }
    if let Some(level) = &cli.log_level {
        std::env::set_var("RELAY_LOG_LEVEL", level);
    } else if matches!(cli.command, Command::Chat { .. })
        && std::env::var("RELAY_LOG_LEVEL").is_err()
    {
        // stderr shares the terminal with the transcript
        std::env::set_var("RELAY_LOG_LEVEL", "warn");
    }
    init_logging();

    let mut config = RelayConfig::from_env();
    match cli.command {
        Command::Serve {
            host,
            port,
            adk_base_url,
            logs,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(url) = adk_base_url {
                config.adk_base_url = url;
            }
            config.logs_enabled |= logs;
            config.validate().context("invalid relay configuration")?;
            serve(&config).await
        }
        Command::Chat { proxy_url, token } => {
            if let Some(url) = proxy_url {
                config.proxy_url = url;
            }
            if token.is_some() {
                config.client_token = token;
            }
            config.validate().context("invalid relay configuration")?;
            run_terminal(&TerminalConfig::from(&config))
                .await
                .context("terminal chat failed")?;
            Ok(())
        }
    }
}

async fn serve(config: &RelayConfig) -> anyhow::Result<()> {
    let mut server = RelayServer::new(RelayServerConfig::from(config));
    let addr = server.start().await?;
    println!(
        "Relay: http://{}/\nForwarding to: {}",
        addr, config.adk_base_url
    );

    #[cfg(unix)]
    {
        let mut term =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = term { s.recv().await; }
            } => {},
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    server.stop().await?;
    Ok(())
}
