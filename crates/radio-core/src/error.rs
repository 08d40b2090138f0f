use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::blocklist::RuleKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the core can report to the UI layer.
#[derive(Debug, Error)]
pub enum Error {
    /// The external player binary could not be resolved.
    #[error("player binary not found: install mpv or set player.binary in config.toml")]
    PlayerUnavailable,

    #[error("failed to start player {binary:?}: {source}")]
    ProcessSpawnFailed {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("station \"{name}\" is already blocked")]
    AlreadyBlocked { station_uuid: String, name: String },

    #[error("station {station_uuid} is not blocked")]
    NotBlocked { station_uuid: String },

    #[error("a {kind} rule for \"{value}\" already exists")]
    RuleAlreadyExists { kind: RuleKind, value: String },

    #[error("no {kind} rule for \"{value}\"")]
    RuleNotFound { kind: RuleKind, value: String },

    #[error("{kind} rule value must not be empty")]
    InvalidRuleValue { kind: RuleKind },

    #[error("already voted for {station_uuid}; try again in {}s", remaining.as_secs())]
    VoteCooldownActive {
        station_uuid: String,
        remaining: Duration,
    },

    #[error("failed to read {path:?}: {source}")]
    PersistenceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    PersistenceWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {path:?}: {source}")]
    DocumentParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("document {path:?} has version {found}, newest supported is {supported}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

impl Error {
    /// Expected outcomes the UI shows as-is. These never leave a store in a
    /// changed state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::AlreadyBlocked { .. }
                | Error::NotBlocked { .. }
                | Error::RuleAlreadyExists { .. }
                | Error::RuleNotFound { .. }
                | Error::InvalidRuleValue { .. }
                | Error::VoteCooldownActive { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AlreadyBlocked {
            station_uuid: "abc".to_string(),
            name: "Jazz FM".to_string(),
        };
        assert_eq!(err.to_string(), "station \"Jazz FM\" is already blocked");

        let err = Error::RuleNotFound {
            kind: RuleKind::Country,
            value: "US".to_string(),
        };
        assert_eq!(err.to_string(), "no country rule for \"US\"");

        let err = Error::VoteCooldownActive {
            station_uuid: "abc".to_string(),
            remaining: Duration::from_secs(42),
        };
        assert_eq!(err.to_string(), "already voted for abc; try again in 42s");
    }

    #[test]
    fn test_validation_classification() {
        assert!(Error::NotBlocked {
            station_uuid: "x".to_string()
        }
        .is_validation());
        assert!(!Error::PlayerUnavailable.is_validation());
        assert!(!Error::PersistenceWriteFailed {
            path: PathBuf::from("/tmp/x"),
            source: std::io::Error::other("disk full"),
        }
        .is_validation());
    }
}
