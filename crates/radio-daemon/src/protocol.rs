use radio_core::{BlockRule, BlockedStation, RuleKind, Station};
use serde::{Deserialize, Serialize};

/// One JSON line read from stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    Play { station: Station },
    Stop,
    Status,
    Block { station: Station },
    Unblock { station_uuid: String },
    UndoBlock,
    ListBlocked,
    ClearBlocked,
    AddRule { kind: RuleKind, value: String },
    RemoveRule { kind: RuleKind, value: String },
    ListRules,
    /// Is this station hidden by the blocklist, by id or by rule?
    CheckStation { station: Station },
    Vote { station_uuid: String },
    VoteStatus { station_uuid: String },
    RemoveVote { station_uuid: String },
    ClearVotes,
}

/// One JSON line written to stdout per command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply")]
pub enum Reply {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Status {
        playing: bool,
        phase: String,
        station: Option<Station>,
    },
    Blocked {
        stations: Vec<BlockedStation>,
    },
    Rules {
        rules: Vec<BlockRule>,
    },
    StationCheck {
        blocked: bool,
        by_id: bool,
        by_rule: bool,
    },
    VoteStatus {
        has_voted: bool,
        can_vote_again: bool,
        cooldown_remaining_secs: Option<u64>,
    },
    Error {
        message: String,
        /// Expected outcomes (duplicate block, cooldown, ...) as opposed to
        /// I/O or player failures.
        recoverable: bool,
    },
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Ok { message: None }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Reply::Ok {
            message: Some(message.into()),
        }
    }

    pub fn error(err: &radio_core::Error) -> Self {
        Reply::Error {
            message: err.to_string(),
            recoverable: err.is_validation(),
        }
    }
}
