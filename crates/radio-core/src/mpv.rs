//! Builds the mpv command line for one station.
//!
//! mpv runs with no video, no terminal input and no cache so it behaves as a
//! headless live-stream player. The process is owned and reaped by
//! `PlaybackSupervisor`; nothing here touches a running child.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::station::Station;

/// Produces the command that streams a station. The supervisor spawns it.
pub trait PlayerLauncher: Send + Sync {
    fn command(&self, station: &Station) -> Result<Command>;
}

pub struct MpvLauncher {
    binary: Option<PathBuf>,
    use_system_deps: bool,
    default_volume: f32,
    extra_args: Vec<String>,
}

impl MpvLauncher {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            use_system_deps: config.use_system_deps,
            default_volume: config.default_volume,
            extra_args: config.extra_args.clone(),
        }
    }

    fn resolve_binary(&self) -> Option<PathBuf> {
        match &self.binary {
            // A bare program name is looked up on PATH like a shell would.
            Some(p) if p.components().count() == 1 && !p.is_absolute() => p
                .to_str()
                .and_then(|name| crate::platform::find_on_path(&[name])),
            Some(p) if p.exists() => Some(p.clone()),
            Some(_) => None,
            None => crate::platform::find_mpv_binary(self.use_system_deps),
        }
    }

    /// Arguments after the binary name, stream URL last.
    pub fn args(&self, station: &Station) -> Vec<String> {
        let volume = station.volume.unwrap_or(self.default_volume);
        let mut args = vec![
            "--no-video".to_string(),
            "--no-terminal".to_string(),
            "--really-quiet".to_string(),
            "--cache=no".to_string(),
            format!(
                "--volume={}",
                (volume * 100.0).clamp(0.0, 100.0).round() as i64
            ),
        ];
        args.extend(self.extra_args.iter().cloned());
        args.push(station.stream_url().to_string());
        args
    }
}

impl PlayerLauncher for MpvLauncher {
    fn command(&self, station: &Station) -> Result<Command> {
        let binary = self.resolve_binary().ok_or(Error::PlayerUnavailable)?;
        let args = self.args(station);
        debug!("mpv: {:?} {:?}", binary, args);

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Ok(cmd)
    }
}
