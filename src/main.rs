use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use wsgat::cli::{Cli, Command};
use wsgat::websocket::client;
use wsgat::{AnsiConsole, ListenServer, SessionEnd, StdinLines};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Diagnostics go to stderr so they stay out of the console on stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wsgat=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Listen(args) => {
            let config = args.into_config();
            let server = ListenServer::new(config, StdinLines::new(), AnsiConsole::stdout());
            server.run().await.wrap_err("Failed to run listen server")?;
        }
        Command::Connect(args) => {
            let config = args.into_config().wrap_err("Invalid connect options")?;

            let shutdown = CancellationToken::new();
            let interrupt = shutdown.clone();
            tokio::spawn(async move {
                match signal::ctrl_c().await {
                    Ok(()) => interrupt.cancel(),
                    Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
                }
            });

            let end = client::run(&config, StdinLines::new(), AnsiConsole::stdout(), shutdown)
                .await
                .wrap_err_with(|| format!("Failed to connect to {}", config.url))?;
            if let SessionEnd::SendFailed(e) = end {
                return Err(e).wrap_err("Connection failed while sending");
            }
        }
    }

    Ok(())
}
