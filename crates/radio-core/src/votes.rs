//! Permanent record of stations the user has voted for.
//!
//! A record is never expired. `has_voted` answers "ever voted", while
//! `can_vote_again` only tells the caller whether another upstream vote is
//! worth sending, based on [`VOTE_COOLDOWN`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::persist;

/// The directory accepts one vote per station per client every ten minutes.
pub const VOTE_COOLDOWN: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotedStation {
    pub station_uuid: String,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VoteDocument {
    #[serde(default)]
    stations: Vec<VotedStation>,
}

pub struct VoteTracker {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    votes: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl VoteTracker {
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let tracker = Self {
            path: path.into(),
            clock,
            votes: RwLock::new(HashMap::new()),
        };
        tracker.load()?;
        Ok(tracker)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<()> {
        let doc = persist::read_json::<VoteDocument>(&self.path)?.unwrap_or_default();
        let mut loaded = HashMap::with_capacity(doc.stations.len());
        for v in doc.stations {
            // Keep the newest timestamp if a hand-edited file repeats an id.
            let at = loaded.entry(v.station_uuid).or_insert(v.voted_at);
            if v.voted_at > *at {
                *at = v.voted_at;
            }
        }
        debug!("votes: loaded {} records from {:?}", loaded.len(), self.path);
        *self.votes.write() = loaded;
        Ok(())
    }

    fn commit(
        &self,
        current: &mut HashMap<String, DateTime<Utc>>,
        next: HashMap<String, DateTime<Utc>>,
    ) -> Result<()> {
        persist::write_json_atomic(&self.path, &to_document(&next))?;
        *current = next;
        Ok(())
    }

    /// Record a vote now, replacing any earlier timestamp for the station.
    pub fn add_vote(&self, station_uuid: &str) -> Result<()> {
        let now = self.clock.now();
        let mut guard = self.votes.write();
        let mut next = guard.clone();
        next.insert(station_uuid.to_string(), now);
        self.commit(&mut guard, next)?;
        info!("votes: recorded vote for {}", station_uuid);
        Ok(())
    }

    pub fn has_voted(&self, station_uuid: &str) -> bool {
        self.votes.read().contains_key(station_uuid)
    }

    pub fn last_voted_at(&self, station_uuid: &str) -> Option<DateTime<Utc>> {
        self.votes.read().get(station_uuid).copied()
    }

    /// Time left before another vote is worth sending; `None` when a vote
    /// may be sent now.
    pub fn cooldown_remaining(&self, station_uuid: &str) -> Option<Duration> {
        let at = self.last_voted_at(station_uuid)?;
        let elapsed = self
            .clock
            .now()
            .signed_duration_since(at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        VOTE_COOLDOWN.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub fn can_vote_again(&self, station_uuid: &str) -> bool {
        self.cooldown_remaining(station_uuid).is_none()
    }

    pub fn ensure_can_vote(&self, station_uuid: &str) -> Result<()> {
        match self.cooldown_remaining(station_uuid) {
            Some(remaining) => Err(Error::VoteCooldownActive {
                station_uuid: station_uuid.to_string(),
                remaining,
            }),
            None => Ok(()),
        }
    }

    /// Forget one station's vote. Returns whether a record existed.
    pub fn remove_vote(&self, station_uuid: &str) -> Result<bool> {
        let mut guard = self.votes.write();
        if !guard.contains_key(station_uuid) {
            return Ok(false);
        }
        let mut next = guard.clone();
        next.remove(station_uuid);
        self.commit(&mut guard, next)?;
        info!("votes: removed vote for {}", station_uuid);
        Ok(true)
    }

    pub fn clear_all(&self) -> Result<()> {
        let mut guard = self.votes.write();
        self.commit(&mut guard, HashMap::new())?;
        info!("votes: cleared all records");
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.votes.read().len()
    }

    /// All records, sorted by station id.
    pub fn get_all(&self) -> Vec<VotedStation> {
        to_document(&self.votes.read()).stations
    }
}

fn to_document(votes: &HashMap<String, DateTime<Utc>>) -> VoteDocument {
    let mut stations: Vec<VotedStation> = votes
        .iter()
        .map(|(id, at)| VotedStation {
            station_uuid: id.clone(),
            voted_at: *at,
        })
        .collect();
    stations.sort_by(|a, b| a.station_uuid.cmp(&b.station_uuid));
    VoteDocument { stations }
}
