use std::sync::Arc;

use radio_core::config::Config;
use radio_core::{
    BlocklistStore, Clock, MpvLauncher, PlaybackSupervisor, PlayerLauncher, SystemClock,
    VoteTracker,
};
use tracing::{info, warn};

use crate::protocol::{Command, Reply};

/// Owns one of each component and routes commands to them.
pub struct DaemonCore {
    player: PlaybackSupervisor,
    blocklist: BlocklistStore,
    votes: VoteTracker,
}

impl DaemonCore {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let launcher = Arc::new(MpvLauncher::new(&config.player));
        Self::with_parts(config, launcher, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: &Config,
        launcher: Arc<dyn PlayerLauncher>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let blocklist = BlocklistStore::open(&config.paths.blocklist_file, clock.clone())?;
        let votes = VoteTracker::open(&config.paths.votes_file, clock)?;
        info!(
            "core: {} blocked stations, {} rules, {} votes",
            blocklist.count(),
            blocklist.get_block_rules().len(),
            votes.count()
        );
        Ok(Self {
            player: PlaybackSupervisor::new(launcher),
            blocklist,
            votes,
        })
    }

    pub async fn handle_command(&self, cmd: Command) -> Reply {
        let result = match cmd {
            Command::Play { station } => {
                let name = station.name.clone();
                self.player
                    .play(station)
                    .await
                    .map(|_| Reply::message(format!("Playing \"{}\"", name)))
            }
            Command::Stop => self.player.stop().await.map(|_| Reply::ok()),
            Command::Status => Ok(self.status()),
            Command::Block { station } => self.blocklist.block(&station).map(Reply::message),
            Command::Unblock { station_uuid } => {
                self.blocklist.unblock(&station_uuid).map(|_| Reply::ok())
            }
            Command::UndoBlock => self.blocklist.undo_last_block().map(|undone| {
                if undone {
                    Reply::message("Undid last block")
                } else {
                    Reply::message("Nothing to undo")
                }
            }),
            Command::ListBlocked => Ok(Reply::Blocked {
                stations: self.blocklist.get_all(),
            }),
            Command::ClearBlocked => self.blocklist.clear().map(|_| Reply::ok()),
            Command::AddRule { kind, value } => self
                .blocklist
                .add_block_rule(kind, &value)
                .map(|_| Reply::ok()),
            Command::RemoveRule { kind, value } => self
                .blocklist
                .remove_block_rule(kind, &value)
                .map(|_| Reply::ok()),
            Command::ListRules => Ok(Reply::Rules {
                rules: self.blocklist.get_block_rules(),
            }),
            Command::CheckStation { station } => {
                let by_id = self.blocklist.is_blocked(&station.station_uuid);
                let by_rule = self.blocklist.is_blocked_by_rule(&station);
                Ok(Reply::StationCheck {
                    blocked: by_id || by_rule,
                    by_id,
                    by_rule,
                })
            }
            // The upstream vote request belongs to the directory client; we
            // only gate and record it.
            Command::Vote { station_uuid } => self
                .votes
                .ensure_can_vote(&station_uuid)
                .and_then(|_| self.votes.add_vote(&station_uuid))
                .map(|_| Reply::message("Vote recorded")),
            Command::VoteStatus { station_uuid } => Ok(Reply::VoteStatus {
                has_voted: self.votes.has_voted(&station_uuid),
                can_vote_again: self.votes.can_vote_again(&station_uuid),
                cooldown_remaining_secs: self
                    .votes
                    .cooldown_remaining(&station_uuid)
                    .map(|d| d.as_secs()),
            }),
            Command::RemoveVote { station_uuid } => {
                self.votes.remove_vote(&station_uuid).map(|removed| {
                    if removed {
                        Reply::ok()
                    } else {
                        Reply::message("No vote recorded for that station")
                    }
                })
            }
            Command::ClearVotes => self.votes.clear_all().map(|_| Reply::ok()),
        };

        result.unwrap_or_else(|e| {
            if e.is_validation() {
                info!("core: {}", e);
            } else {
                warn!("core: {}", e);
            }
            Reply::error(&e)
        })
    }

    fn status(&self) -> Reply {
        Reply::Status {
            playing: self.player.is_playing(),
            phase: format!("{:?}", self.player.phase()),
            station: self.player.current_station(),
        }
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.player.stop().await {
            warn!("core: stop on shutdown failed: {}", e);
        }
    }
}
