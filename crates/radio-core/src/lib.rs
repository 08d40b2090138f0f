//! Playback supervision and the durable blocklist / vote stores behind the
//! radio player.
//!
//! The three components are independent: the UI layer owns one of each and
//! coordinates them. Each store owns exactly one JSON file.

pub mod blocklist;
pub mod clock;
pub mod config;
pub mod error;
pub mod mpv;
pub mod persist;
pub mod platform;
pub mod playback;
pub mod station;
pub mod votes;

pub use blocklist::{BlockRule, BlockedStation, BlocklistStore, RuleKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use mpv::{MpvLauncher, PlayerLauncher};
pub use playback::{PlaybackPhase, PlaybackSupervisor};
pub use station::Station;
pub use votes::{VoteTracker, VotedStation, VOTE_COOLDOWN};
