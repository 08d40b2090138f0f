use serde::{Deserialize, Serialize};

/// A streamable station as delivered by the directory search.
///
/// The core never mutates a `Station`; it only reads it, copies parts of it
/// into the blocklist, or hands its URL to the player.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Station {
    /// Stable directory id (`stationuuid` upstream).
    #[serde(alias = "stationuuid")]
    pub station_uuid: String,
    pub name: String,
    /// Raw stream URL as listed.
    #[serde(default)]
    pub url: String,
    /// Stream URL after playlist/redirect resolution by the directory.
    #[serde(default)]
    pub url_resolved: String,
    /// Comma-separated tag list.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub country: String,
    /// ISO 3166-1 alpha-2 code.
    #[serde(default)]
    pub countrycode: String,
    #[serde(default)]
    pub state: String,
    /// Comma-separated language list.
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub bitrate: u32,
    /// Per-station playback volume, 0.0..=1.0. Falls back to the configured
    /// default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

impl Station {
    /// URL handed to the player: the resolved one when the directory gave
    /// us one, otherwise the raw listing.
    pub fn stream_url(&self) -> &str {
        if self.url_resolved.trim().is_empty() {
            self.url.trim()
        } else {
            self.url_resolved.trim()
        }
    }

    pub fn tag_list(&self) -> Vec<&str> {
        split_list(&self.tags)
    }

    pub fn language_list(&self) -> Vec<&str> {
        split_list(&self.language)
    }
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url_prefers_resolved() {
        let mut station = Station {
            url: "http://example.com/listen.pls".to_string(),
            url_resolved: "http://example.com/stream.mp3".to_string(),
            ..Station::default()
        };
        assert_eq!(station.stream_url(), "http://example.com/stream.mp3");

        station.url_resolved = "  ".to_string();
        assert_eq!(station.stream_url(), "http://example.com/listen.pls");
    }

    #[test]
    fn test_list_fields_split_on_commas() {
        let station = Station {
            tags: "jazz, smooth jazz,,lounge ".to_string(),
            language: "english,french".to_string(),
            ..Station::default()
        };
        assert_eq!(station.tag_list(), vec!["jazz", "smooth jazz", "lounge"]);
        assert_eq!(station.language_list(), vec!["english", "french"]);
    }

    #[test]
    fn test_deserialize_directory_spelling() {
        let json = r#"{"stationuuid":"9617a958","name":"Radio Paradise","url_resolved":"https://stream.radioparadise.com/aac-320","bitrate":320}"#;
        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.station_uuid, "9617a958");
        assert_eq!(station.bitrate, 320);
        assert!(station.volume.is_none());
    }
}
