//! minerd - mining rig daemon with a web control plane.

use anyhow::Result;
use clap::Parser;
use minerd_daemon::{AppConfig, Application, ExitIntent};
use minerd_telemetry::LogFormat;
use minerd_web::LogRelay;
use tracing::info;

/// Mining rig daemon
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via MINERD_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Warnings and errors also go to the browser console of every run.
    let relay = LogRelay::new();
    minerd_telemetry::init_logging_with(LogFormat::from_env()?, Some(Box::new(relay.clone())))?;

    info!("Starting minerd v{}", env!("CARGO_PKG_VERSION"));

    // Restart reloads the configuration and runs the application again.
    loop {
        let config = AppConfig::load(args.config.as_deref())?;
        info!(
            bind = %config.web.bind,
            port = config.web.port,
            auth = config.web.auth_enabled(),
            plot_dirs = config.miner.plot_dirs.len(),
            "Configuration loaded"
        );

        let app = Application::new(config)?;
        app.attach_log_relay(&relay);
        match app.run().await? {
            ExitIntent::Restart => info!("Restarting"),
            ExitIntent::Shutdown | ExitIntent::Running => break,
        }
    }

    info!("minerd stopped");
    Ok(())
}
