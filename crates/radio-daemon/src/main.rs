mod core;
mod protocol;

use radio_core::config::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::protocol::{Command, Reply};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = radio_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // stdout carries replies, so logs only ever go to the file.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,radio_core=debug,radio_daemon=debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("radio-daemon log: {}", log_path.display());
    info!("Log file: {:?}", log_path);

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let daemon_core = core::DaemonCore::new(&config)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("Daemon initialised, reading commands from stdin");
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Command>(trimmed) {
            Ok(cmd) => {
                info!("command: {:?}", cmd);
                daemon_core.handle_command(cmd).await
            }
            Err(e) => {
                warn!("invalid command '{}': {}", trimmed, e);
                Reply::Error {
                    message: format!("invalid command: {}", e),
                    recoverable: true,
                }
            }
        };

        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    info!("stdin closed, shutting down");
    daemon_core.shutdown().await;
    Ok(())
}
