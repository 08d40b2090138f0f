//! Supervises the external player so exactly one station streams at a time.
//!
//! ```text
//!   play(station)
//!     ├── stop any running session (kill + reap)
//!     ├── spawn player            ── Idle on failure
//!     └── spawn watcher task
//!            select!
//!              ├── child exits on its own  → clear state if session id still current
//!              └── stop signal / sender dropped → kill + reap, leave state to stop()
//! ```
//!
//! `play` and `stop` are serialised by an async control mutex. Shared state
//! sits behind a `parking_lot::RwLock` that is never held across an await, so
//! the read accessors are safe from any thread at any time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::process::Child;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mpv::PlayerLauncher;
use crate::station::Station;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Starting,
    Playing,
    Stopping,
}

/// Handles for the live session. The child itself belongs to the watcher.
struct Session {
    id: u64,
    pid: Option<u32>,
    stop_tx: oneshot::Sender<()>,
    watcher: JoinHandle<()>,
}

#[derive(Default)]
struct SupervisorState {
    phase: PlaybackPhase,
    station: Option<Station>,
    session: Option<Session>,
}

pub struct PlaybackSupervisor {
    launcher: Arc<dyn PlayerLauncher>,
    control: Mutex<()>,
    state: Arc<RwLock<SupervisorState>>,
    next_session: AtomicU64,
}

impl PlaybackSupervisor {
    pub fn new(launcher: Arc<dyn PlayerLauncher>) -> Self {
        Self {
            launcher,
            control: Mutex::new(()),
            state: Arc::new(RwLock::new(SupervisorState::default())),
            next_session: AtomicU64::new(1),
        }
    }

    /// Start streaming `station`, replacing whatever was playing.
    ///
    /// The previous process has fully exited before the new one is spawned.
    /// On error the supervisor is left `Idle`.
    pub async fn play(&self, station: Station) -> Result<()> {
        let _control = self.control.lock().await;
        self.stop_session().await;

        self.state.write().phase = PlaybackPhase::Starting;

        let mut cmd = match self.launcher.command(&station) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("playback: cannot start {}: {}", station.name, e);
                self.state.write().phase = PlaybackPhase::Idle;
                return Err(e);
            }
        };
        let binary = std::path::PathBuf::from(cmd.as_std().get_program());

        let child = match cmd.kill_on_drop(true).spawn() {
            Ok(child) => child,
            Err(source) => {
                warn!("playback: spawn of {:?} failed: {}", binary, source);
                self.state.write().phase = PlaybackPhase::Idle;
                return Err(Error::ProcessSpawnFailed { binary, source });
            }
        };

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        let (stop_tx, stop_rx) = oneshot::channel();

        // Publish the session before the watcher can observe an exit, so a
        // player that dies instantly is still cleaned up.
        let mut state = self.state.write();
        let watcher = tokio::spawn(watch_session(id, child, stop_rx, Arc::clone(&self.state)));
        info!(
            "playback: session {} playing {} (pid {:?})",
            id, station.name, pid
        );
        state.session = Some(Session {
            id,
            pid,
            stop_tx,
            watcher,
        });
        state.station = Some(station);
        state.phase = PlaybackPhase::Playing;
        Ok(())
    }

    /// Stop playback and wait for the player to exit. A no-op when idle.
    pub async fn stop(&self) -> Result<()> {
        let _control = self.control.lock().await;
        self.stop_session().await;
        Ok(())
    }

    async fn stop_session(&self) {
        let session = {
            let mut state = self.state.write();
            match state.session.take() {
                Some(session) => {
                    state.phase = PlaybackPhase::Stopping;
                    session
                }
                None => {
                    state.phase = PlaybackPhase::Idle;
                    state.station = None;
                    return;
                }
            }
        };

        debug!("playback: stopping session {}", session.id);
        // The watcher may already be gone if the player exited on its own.
        let _ = session.stop_tx.send(());
        if let Err(e) = session.watcher.await {
            warn!("playback: watcher for session {} failed: {}", session.id, e);
        }

        let mut state = self.state.write();
        state.phase = PlaybackPhase::Idle;
        state.station = None;
        info!("playback: session {} stopped", session.id);
    }

    pub fn is_playing(&self) -> bool {
        self.state.read().phase == PlaybackPhase::Playing
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.state.read().phase
    }

    pub fn current_station(&self) -> Option<Station> {
        self.state.read().station.clone()
    }

    /// OS pid of the running player, if any.
    pub fn current_pid(&self) -> Option<u32> {
        self.state.read().session.as_ref().and_then(|s| s.pid)
    }
}

async fn watch_session(
    id: u64,
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    state: Arc<RwLock<SupervisorState>>,
) {
    tokio::select! {
        status = child.wait() => {
            match &status {
                Ok(s) => info!("playback: session {} player exited on its own ({})", id, s),
                Err(e) => warn!("playback: session {} wait failed: {}", id, e),
            }
            let mut guard = state.write();
            if guard.session.as_ref().map(|s| s.id) == Some(id) {
                guard.session = None;
                guard.station = None;
                guard.phase = PlaybackPhase::Idle;
            }
        }
        // Fires on an explicit stop and when the sender is dropped.
        _ = stop_rx => {
            terminate(id, &mut child).await;
        }
    }
}

async fn terminate(id: u64, child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!("playback: session {} already exited ({})", id, status);
            return;
        }
        Ok(None) => {}
        Err(e) => debug!("playback: session {} try_wait failed: {}", id, e),
    }
    // `kill` sends the signal and reaps the child.
    if let Err(e) = child.kill().await {
        debug!("playback: session {} kill: {}", id, e);
        let _ = child.wait().await;
    }
}

impl Drop for PlaybackSupervisor {
    fn drop(&mut self) {
        // Dropping the stop sender wakes the watcher, which kills the player.
        if let Some(session) = self.state.write().session.take() {
            debug!("playback: supervisor dropped with session {} live", session.id);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::process::Command;

    /// Runs `sh -c <script>` instead of a real player.
    struct ScriptLauncher(&'static str);

    impl PlayerLauncher for ScriptLauncher {
        fn command(&self, _station: &Station) -> Result<Command> {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.0);
            Ok(cmd)
        }
    }

    struct MissingLauncher;

    impl PlayerLauncher for MissingLauncher {
        fn command(&self, _station: &Station) -> Result<Command> {
            Err(Error::PlayerUnavailable)
        }
    }

    fn station(id: &str) -> Station {
        Station {
            station_uuid: id.to_string(),
            name: format!("Station {}", id),
            ..Station::default()
        }
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_ok() {
        let sup = PlaybackSupervisor::new(Arc::new(ScriptLauncher("sleep 30")));
        sup.stop().await.unwrap();
        sup.stop().await.unwrap();
        assert_eq!(sup.phase(), PlaybackPhase::Idle);
    }

    #[tokio::test]
    async fn test_play_then_stop() {
        let sup = PlaybackSupervisor::new(Arc::new(ScriptLauncher("sleep 30")));
        sup.play(station("a")).await.unwrap();
        assert!(sup.is_playing());
        assert_eq!(sup.current_station().unwrap().station_uuid, "a");
        assert!(sup.current_pid().is_some());

        sup.stop().await.unwrap();
        assert!(!sup.is_playing());
        assert!(sup.current_station().is_none());
        assert!(sup.current_pid().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_player_leaves_idle() {
        let sup = PlaybackSupervisor::new(Arc::new(MissingLauncher));
        let err = sup.play(station("a")).await.unwrap_err();
        assert!(matches!(err, Error::PlayerUnavailable));
        assert_eq!(sup.phase(), PlaybackPhase::Idle);
        assert!(sup.current_station().is_none());
    }

    #[tokio::test]
    async fn test_natural_exit_returns_to_idle() {
        let sup = PlaybackSupervisor::new(Arc::new(ScriptLauncher("exit 0")));
        sup.play(station("a")).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while sup.is_playing() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("watcher should clear the session");

        assert!(sup.current_station().is_none());
        sup.stop().await.unwrap();
        sup.play(station("b")).await.unwrap();
    }
}
