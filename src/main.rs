mod app;
mod camera;
mod config;
mod enhance;
mod hooks;
mod messages;
mod notify;
mod photo;
mod recommend;
mod services;
mod session;
#[cfg(test)]
mod testing;

use app::App;
use config::Config;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting styleshot capture session");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    let app = App::new(&config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // Main event loop
    loop {
        tracing::debug!("Main loop: waiting for input");
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("Input closed, shutting down");
                    break;
                };
                match app.handle_line(&line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => tracing::error!("Error handling {:?}: {:#}", line.trim(), e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    app.shutdown().await?;
    tracing::info!("Styleshot shutdown complete");
    Ok(())
}
