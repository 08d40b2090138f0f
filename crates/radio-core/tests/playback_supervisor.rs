#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use radio_core::{Error, PlaybackPhase, PlaybackSupervisor, PlayerLauncher, Result, Station};
use tokio::process::Command;

/// Stands in for mpv: each station's `url` is a shell snippet.
struct ShellLauncher;

impl PlayerLauncher for ShellLauncher {
    fn command(&self, station: &Station) -> Result<Command> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(station.stream_url());
        Ok(cmd)
    }
}

/// Points at a binary that does not exist.
struct BrokenLauncher;

impl PlayerLauncher for BrokenLauncher {
    fn command(&self, _station: &Station) -> Result<Command> {
        Ok(Command::new("/nonexistent/radio-player"))
    }
}

fn station(id: &str, script: &str) -> Station {
    Station {
        station_uuid: id.to_string(),
        name: id.to_string(),
        url: script.to_string(),
        ..Station::default()
    }
}

#[cfg(target_os = "linux")]
fn process_gone(pid: u32) -> bool {
    !std::path::Path::new(&format!("/proc/{}", pid)).exists()
}

#[tokio::test]
async fn play_replaces_previous_session() {
    let sup = PlaybackSupervisor::new(Arc::new(ShellLauncher));

    sup.play(station("a", "sleep 30")).await.unwrap();
    let first_pid = sup.current_pid().unwrap();

    sup.play(station("b", "sleep 30")).await.unwrap();
    assert!(sup.is_playing());
    assert_eq!(sup.current_station().unwrap().station_uuid, "b");
    assert_ne!(sup.current_pid().unwrap(), first_pid);

    #[cfg(target_os = "linux")]
    assert!(process_gone(first_pid), "first player must be reaped before the second starts");

    sup.stop().await.unwrap();
    assert_eq!(sup.phase(), PlaybackPhase::Idle);
}

#[tokio::test]
async fn stop_reaps_the_player() {
    let sup = PlaybackSupervisor::new(Arc::new(ShellLauncher));
    sup.play(station("a", "sleep 30")).await.unwrap();
    let pid = sup.current_pid().unwrap();

    sup.stop().await.unwrap();
    assert!(!sup.is_playing());

    #[cfg(target_os = "linux")]
    assert!(process_gone(pid));
    let _ = pid;
}

#[tokio::test]
async fn spawn_failure_is_reported_and_supervisor_stays_usable() {
    let broken = PlaybackSupervisor::new(Arc::new(BrokenLauncher));
    let err = broken.play(station("a", "")).await.unwrap_err();
    assert!(matches!(err, Error::ProcessSpawnFailed { .. }));
    assert_eq!(broken.phase(), PlaybackPhase::Idle);
    broken.stop().await.unwrap();

    let sup = PlaybackSupervisor::new(Arc::new(ShellLauncher));
    sup.play(station("a", "sleep 30")).await.unwrap();
    assert!(sup.is_playing());
    sup.stop().await.unwrap();
}

#[tokio::test]
async fn stop_after_player_already_exited() {
    let sup = PlaybackSupervisor::new(Arc::new(ShellLauncher));
    sup.play(station("a", "exit 3")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    sup.stop().await.unwrap();
    assert_eq!(sup.phase(), PlaybackPhase::Idle);
    assert!(sup.current_station().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_plays_leave_one_session() {
    let sup = Arc::new(PlaybackSupervisor::new(Arc::new(ShellLauncher)));
    let pid_dir = tempfile::tempdir().unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let sup = Arc::clone(&sup);
        // Each player records its own pid before becoming `sleep`.
        let script = format!(
            "echo $$ > {}/s{}.pid; exec sleep 30",
            pid_dir.path().display(),
            i
        );
        tasks.push(tokio::spawn(async move {
            sup.play(station(&format!("s{}", i), &script)).await
        }));
    }

    // Readers run alongside the writers and must never panic.
    let reader = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move {
            for _ in 0..200 {
                let _ = (sup.is_playing(), sup.current_station(), sup.phase());
                tokio::task::yield_now().await;
            }
        })
    };

    for t in tasks {
        t.await.unwrap().unwrap();
    }
    reader.await.unwrap();

    assert!(sup.is_playing());
    let current = sup.current_station().unwrap();
    assert!(current.station_uuid.starts_with('s'));

    #[cfg(target_os = "linux")]
    {
        let live_pid = sup.current_pid().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let recorded: Vec<u32> = std::fs::read_dir(pid_dir.path())
            .unwrap()
            .filter_map(|e| std::fs::read_to_string(e.unwrap().path()).ok())
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        assert!(recorded.contains(&live_pid));

        let alive: Vec<u32> = recorded
            .into_iter()
            .filter(|pid| !process_gone(*pid))
            .collect();
        assert_eq!(
            alive,
            vec![live_pid],
            "only the current player may still be running"
        );
    }

    sup.stop().await.unwrap();
    assert!(!sup.is_playing());
}

#[tokio::test]
async fn natural_exit_is_detected_without_stop() {
    let sup = PlaybackSupervisor::new(Arc::new(ShellLauncher));
    sup.play(station("a", "sleep 0.1")).await.unwrap();
    assert!(sup.is_playing());

    tokio::time::timeout(Duration::from_secs(5), async {
        while sup.is_playing() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("supervisor should notice the player exiting");

    assert_eq!(sup.phase(), PlaybackPhase::Idle);
    assert!(sup.current_pid().is_none());
}
