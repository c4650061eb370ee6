//! Song identity and the small value types shared by every module.
//!
//! A [`Song`] belongs to the catalog; the playback core only ever clones and
//! compares it. Two identities are carried on purpose: `id` addresses the
//! catalog row, while `file_id` names the underlying media file and is the key
//! used for every played/listened set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Catalog identity of a song.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(pub String);

/// Stable media identity, used as the dedup key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

/// Signed-in listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl $ty {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(SongId);
string_id!(FileId);
string_id!(UserId);

/// How a song is presented to the playback core.
///
/// A song deserialized without a `file_id` gets its `id` as file id, so the
/// played and listened sets never see an empty key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SongRecord")]
pub struct Song {
    pub id: SongId,
    pub file_id: FileId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Artwork asset identifier, resolved through [`crate::media::ArtworkCache`].
    #[serde(default)]
    pub img_id: Option<String>,
    #[serde(default)]
    pub is_liked: bool,
    /// Duration advertised by the catalog, if any. The media transport
    /// remains the authority once metadata is loaded.
    #[serde(default, with = "duration_secs")]
    pub duration: Option<Duration>,
}

/// Wire shape of [`Song`]; only used while deserializing.
#[derive(Deserialize)]
struct SongRecord {
    id: SongId,
    #[serde(default)]
    file_id: Option<FileId>,
    title: String,
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    img_id: Option<String>,
    #[serde(default)]
    is_liked: bool,
    #[serde(default, with = "duration_secs")]
    duration: Option<Duration>,
}

impl From<SongRecord> for Song {
    fn from(record: SongRecord) -> Self {
        let file_id = record
            .file_id
            .filter(|f| !f.0.is_empty())
            .unwrap_or_else(|| FileId(record.id.0.clone()));
        Self {
            id: record.id,
            file_id,
            title: record.title,
            artist: record.artist,
            album: record.album,
            img_id: record.img_id,
            is_liked: record.is_liked,
            duration: record.duration,
        }
    }
}

impl Song {
    /// Builds a song whose `file_id` equals its `id`.
    #[must_use]
    pub fn new(id: &str, title: &str, artist: &str) -> Self {
        Self {
            id: SongId::from(id),
            file_id: FileId::from(id),
            title: title.to_string(),
            artist: artist.to_string(),
            album: String::new(),
            img_id: None,
            is_liked: false,
            duration: None,
        }
    }

    /// The `file_id`, or the `id` when no file id was given.
    #[must_use]
    pub fn media_key(&self) -> &str {
        if self.file_id.0.is_empty() {
            self.id.as_str()
        } else {
            self.file_id.as_str()
        }
    }

    #[must_use]
    pub fn with_file_id(mut self, file_id: &str) -> Self {
        self.file_id = FileId::from(file_id);
        self
    }

    #[must_use]
    pub fn with_album(mut self, album: &str) -> Self {
        self.album = album.to_string();
        self
    }

    /// Same underlying media file.
    #[must_use]
    pub fn same_file(&self, other: &Song) -> bool {
        self.file_id == other.file_id
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Repeat behaviour applied when a track ends naturally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    /// Replay the current song one more time, then fall back to `Off`.
    Once,
    Infinite,
}

impl std::str::FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "once" => Ok(Self::Once),
            "infinite" => Ok(Self::Infinite),
            other => Err(format!("unknown repeat mode `{other}'")),
        }
    }
}

mod duration_secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|e| D::Error::custom(format!("invalid duration {secs}: {e}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_defaults_to_id() {
        let song = Song::new("a", "Alpha", "Artist");
        assert_eq!(song.file_id.as_str(), "a");

        let song = song.with_file_id("f-a");
        assert_eq!(song.file_id, FileId::from("f-a"));
        assert_eq!(song.id, SongId::from("a"));
    }

    #[test]
    fn test_same_file_ignores_catalog_id() {
        let a = Song::new("1", "Alpha", "Artist").with_file_id("shared");
        let b = Song::new("2", "Alpha (Remaster)", "Artist").with_file_id("shared");
        assert!(a.same_file(&b));
    }

    #[test]
    fn test_song_json_roundtrip_with_duration() {
        let json = r#"{"id":"7","file_id":"f7","title":"T","artist":"A","duration":181.5}"#;
        let song: Song = serde_json::from_str(json).expect("valid song json");
        assert_eq!(song.duration, Some(Duration::from_secs_f64(181.5)));
        assert!(!song.is_liked);
        assert_eq!(song.album, "");
    }

    #[test]
    fn test_missing_file_id_falls_back_to_id() {
        let song: Song = serde_json::from_str(r#"{"id":"9","title":"T","artist":"A"}"#).unwrap();
        assert_eq!(song.file_id, FileId::from("9"));
        assert_eq!(song.media_key(), "9");

        let song: Song =
            serde_json::from_str(r#"{"id":"9","file_id":"","title":"T","artist":"A"}"#).unwrap();
        assert_eq!(song.file_id, FileId::from("9"));
    }

    #[test]
    fn test_songs_without_file_id_stay_distinct() {
        let json = r#"[
            {"id":"a","title":"Alpha","artist":"X"},
            {"id":"b","title":"Beta","artist":"X"}
        ]"#;
        let songs: Vec<Song> = serde_json::from_str(json).unwrap();
        assert!(!songs[0].same_file(&songs[1]));
    }

    #[test]
    fn test_out_of_range_duration_is_an_error() {
        let huge = r#"{"id":"1","title":"T","artist":"A","duration":1e30}"#;
        assert!(serde_json::from_str::<Song>(huge).is_err());

        let negative = r#"{"id":"1","title":"T","artist":"A","duration":-3}"#;
        assert!(serde_json::from_str::<Song>(negative).is_err());
    }

    #[test]
    fn test_repeat_mode_parse() {
        assert_eq!("once".parse::<RepeatMode>(), Ok(RepeatMode::Once));
        assert_eq!("infinite".parse::<RepeatMode>(), Ok(RepeatMode::Infinite));
        assert!("twice".parse::<RepeatMode>().is_err());
    }
}
