//! Durable station blocklist with country/language/tag rules.
//!
//! The whole store lives in one JSON document:
//!
//! ```text
//! { "version": 1,
//!   "blocked_stations": [ { "station_uuid", "name", ..., "blocked_at" } ],
//!   "block_rules":      [ { "type": "country" | "language" | "tag", "value" } ] }
//! ```
//!
//! Every mutation stages a full copy of the store, writes that copy to disk,
//! and only then publishes it in memory. A failed write therefore leaves the
//! in-memory store exactly as it was.
//!
//! Undo keeps a single pointer to the most recent `block`. It is cleared by
//! `undo_last_block`, `clear`, `load`, and by unblocking that same station.
//! Unblocking a different station or editing rules leaves it alone.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::persist;
use crate::station::Station;

pub const BLOCKLIST_VERSION: u32 = 1;

/// Block confirmations gain a hint about rules once the list gets this long.
pub const BLOCKLIST_NOTICE_THRESHOLD: usize = 100;
/// Past this size the confirmation warns that filtering gets slower.
pub const BLOCKLIST_WARNING_THRESHOLD: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Country,
    Language,
    Tag,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Country => "country",
            RuleKind::Language => "language",
            RuleKind::Tag => "tag",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub value: String,
}

impl BlockRule {
    fn is_same(&self, kind: RuleKind, value: &str) -> bool {
        self.kind == kind && eq_ignore_case(&self.value, value)
    }

    /// Country rules match either the country name or its ISO code;
    /// language and tag rules match any element of the station's list.
    pub fn matches(&self, station: &Station) -> bool {
        let value = self.value.trim();
        match self.kind {
            RuleKind::Country => {
                eq_ignore_case(value, &station.country)
                    || eq_ignore_case(value, &station.countrycode)
            }
            RuleKind::Language => station
                .language_list()
                .into_iter()
                .any(|lang| eq_ignore_case(value, lang)),
            RuleKind::Tag => station
                .tag_list()
                .into_iter()
                .any(|tag| eq_ignore_case(value, tag)),
        }
    }
}

impl fmt::Display for BlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.value)
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

/// A snapshot of the station as it looked when the user blocked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedStation {
    pub station_uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countrycode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    pub blocked_at: DateTime<Utc>,
}

impl BlockedStation {
    fn from_station(station: &Station, blocked_at: DateTime<Utc>) -> Self {
        Self {
            station_uuid: station.station_uuid.clone(),
            name: station.name.clone(),
            tags: non_empty(&station.tags),
            country: non_empty(&station.country),
            countrycode: non_empty(&station.countrycode),
            state: non_empty(&station.state),
            language: non_empty(&station.language),
            codec: non_empty(&station.codec),
            bitrate: (station.bitrate > 0).then_some(station.bitrate),
            blocked_at,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[derive(Debug, Serialize, Deserialize)]
struct BlocklistDocument {
    version: u32,
    #[serde(default)]
    blocked_stations: Vec<BlockedStation>,
    #[serde(default)]
    block_rules: Vec<BlockRule>,
}

#[derive(Debug, Clone, Default)]
struct Blocklist {
    stations: HashMap<String, BlockedStation>,
    rules: Vec<BlockRule>,
    /// Station id of the most recent `block`, for one-shot undo.
    last_blocked: Option<String>,
}

impl Blocklist {
    fn from_document(doc: BlocklistDocument) -> Self {
        let mut list = Blocklist::default();
        for station in doc.blocked_stations {
            list.stations
                .entry(station.station_uuid.clone())
                .or_insert(station);
        }
        for rule in doc.block_rules {
            if !list.rules.iter().any(|r| r.is_same(rule.kind, &rule.value)) {
                list.rules.push(rule);
            }
        }
        list
    }

    fn to_document(&self) -> BlocklistDocument {
        BlocklistDocument {
            version: BLOCKLIST_VERSION,
            blocked_stations: self.sorted(),
            block_rules: self.rules.clone(),
        }
    }

    /// Most recent first; ties fall back to id so the order is stable.
    fn sorted(&self) -> Vec<BlockedStation> {
        let mut all: Vec<BlockedStation> = self.stations.values().cloned().collect();
        all.sort_by(|a, b| {
            b.blocked_at
                .cmp(&a.blocked_at)
                .then_with(|| a.station_uuid.cmp(&b.station_uuid))
        });
        all
    }

    fn blocked_by_rule(&self, station: &Station) -> bool {
        self.rules.iter().any(|rule| rule.matches(station))
    }
}

pub struct BlocklistStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    inner: RwLock<Blocklist>,
}

impl BlocklistStore {
    /// Open the store at `path`, loading whatever is already there.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            clock,
            inner: RwLock::new(Blocklist::default()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory store with the document on disk. On error the
    /// current contents are kept.
    pub fn load(&self) -> Result<()> {
        let loaded = match persist::read_json::<BlocklistDocument>(&self.path)? {
            Some(doc) => {
                if doc.version > BLOCKLIST_VERSION {
                    return Err(Error::UnsupportedVersion {
                        path: self.path.clone(),
                        found: doc.version,
                        supported: BLOCKLIST_VERSION,
                    });
                }
                Blocklist::from_document(doc)
            }
            None => Blocklist::default(),
        };
        debug!(
            "blocklist: loaded {} stations, {} rules from {:?}",
            loaded.stations.len(),
            loaded.rules.len(),
            self.path
        );
        *self.inner.write() = loaded;
        Ok(())
    }

    fn commit(&self, current: &mut Blocklist, next: Blocklist) -> Result<()> {
        persist::write_json_atomic(&self.path, &next.to_document())?;
        *current = next;
        Ok(())
    }

    /// Block a station. Returns the confirmation line for the UI.
    pub fn block(&self, station: &Station) -> Result<String> {
        let mut guard = self.inner.write();
        if let Some(existing) = guard.stations.get(&station.station_uuid) {
            return Err(Error::AlreadyBlocked {
                station_uuid: existing.station_uuid.clone(),
                name: existing.name.clone(),
            });
        }

        let mut next = guard.clone();
        next.stations.insert(
            station.station_uuid.clone(),
            BlockedStation::from_station(station, self.clock.now()),
        );
        next.last_blocked = Some(station.station_uuid.clone());
        let count = next.stations.len();
        self.commit(&mut guard, next)?;

        info!("blocklist: blocked {} ({})", station.name, station.station_uuid);
        Ok(block_message(&station.name, count))
    }

    pub fn unblock(&self, station_uuid: &str) -> Result<()> {
        let mut guard = self.inner.write();
        if !guard.stations.contains_key(station_uuid) {
            return Err(Error::NotBlocked {
                station_uuid: station_uuid.to_string(),
            });
        }

        let mut next = guard.clone();
        next.stations.remove(station_uuid);
        if next.last_blocked.as_deref() == Some(station_uuid) {
            next.last_blocked = None;
        }
        self.commit(&mut guard, next)?;

        info!("blocklist: unblocked {}", station_uuid);
        Ok(())
    }

    /// Remove the most recently blocked station, once. Returns `false` when
    /// there is nothing to undo.
    pub fn undo_last_block(&self) -> Result<bool> {
        let mut guard = self.inner.write();
        let Some(last) = guard.last_blocked.clone() else {
            return Ok(false);
        };

        let mut next = guard.clone();
        next.last_blocked = None;
        let removed = next.stations.remove(&last).is_some();
        self.commit(&mut guard, next)?;

        if removed {
            info!("blocklist: undid block of {}", last);
        }
        Ok(removed)
    }

    /// Drop every blocked station. Rules are left in place.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let mut next = guard.clone();
        next.stations.clear();
        next.last_blocked = None;
        self.commit(&mut guard, next)?;
        info!("blocklist: cleared");
        Ok(())
    }

    pub fn is_blocked(&self, station_uuid: &str) -> bool {
        self.inner.read().stations.contains_key(station_uuid)
    }

    pub fn is_blocked_by_rule(&self, station: &Station) -> bool {
        self.inner.read().blocked_by_rule(station)
    }

    pub fn is_blocked_by_any(&self, station: Option<&Station>) -> bool {
        let Some(station) = station else {
            return false;
        };
        let guard = self.inner.read();
        guard.stations.contains_key(&station.station_uuid) || guard.blocked_by_rule(station)
    }

    /// Keep only the stations that are neither blocked by id nor by a rule.
    pub fn filter_stations(&self, stations: Vec<Station>) -> Vec<Station> {
        let guard = self.inner.read();
        stations
            .into_iter()
            .filter(|s| !guard.stations.contains_key(&s.station_uuid) && !guard.blocked_by_rule(s))
            .collect()
    }

    pub fn get(&self, station_uuid: &str) -> Option<BlockedStation> {
        self.inner.read().stations.get(station_uuid).cloned()
    }

    /// All blocked stations, most recently blocked first.
    pub fn get_all(&self) -> Vec<BlockedStation> {
        self.inner.read().sorted()
    }

    pub fn count(&self) -> usize {
        self.inner.read().stations.len()
    }

    /// Id of the station `undo_last_block` would remove, if any.
    pub fn last_blocked(&self) -> Option<String> {
        self.inner.read().last_blocked.clone()
    }

    pub fn add_block_rule(&self, kind: RuleKind, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidRuleValue { kind });
        }

        let mut guard = self.inner.write();
        if guard.rules.iter().any(|r| r.is_same(kind, value)) {
            return Err(Error::RuleAlreadyExists {
                kind,
                value: value.to_string(),
            });
        }

        let mut next = guard.clone();
        next.rules.push(BlockRule {
            kind,
            value: value.to_string(),
        });
        self.commit(&mut guard, next)?;

        info!("blocklist: added rule {}: {}", kind, value);
        Ok(())
    }

    pub fn remove_block_rule(&self, kind: RuleKind, value: &str) -> Result<()> {
        let mut guard = self.inner.write();
        let Some(idx) = guard.rules.iter().position(|r| r.is_same(kind, value)) else {
            return Err(Error::RuleNotFound {
                kind,
                value: value.trim().to_string(),
            });
        };

        let mut next = guard.clone();
        let removed = next.rules.remove(idx);
        self.commit(&mut guard, next)?;

        info!("blocklist: removed rule {}", removed);
        Ok(())
    }

    pub fn get_block_rules(&self) -> Vec<BlockRule> {
        self.inner.read().rules.clone()
    }
}

fn block_message(name: &str, count: usize) -> String {
    let mut message = format!("Blocked \"{}\"", name);
    if count >= BLOCKLIST_WARNING_THRESHOLD {
        message.push_str(&format!(
            " ({} stations blocked; a list this long slows down filtering)",
            count
        ));
    } else if count >= BLOCKLIST_NOTICE_THRESHOLD {
        message.push_str(&format!(
            " ({} stations blocked; a country, language or tag rule may be simpler)",
            count
        ));
    }
    message
}
