//! Trakt history records.
//!
//! See <https://trakt.docs.apiary.io/#introduction/standard-media-objects>.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// External identifiers attached to a movie, show, or episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvdb: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Movie {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub ids: MediaIds,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Show {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub ids: MediaIds,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Episode {
    /// Trakt sends `null` for episodes that have not been titled yet.
    #[serde(default)]
    pub title: Option<String>,
    pub season: u32,
    pub number: u32,
    #[serde(default)]
    pub ids: MediaIds,
}

/// Trakt sends `null` titles for some catalogue entries; treat them as empty
/// so one record cannot fail a whole page.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// What a history record refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Movie(Movie),
    Episode { episode: Episode, show: Show },
    /// Any `type` this crate does not publish, kept by name.
    Other(String),
}

impl Media {
    /// The `type` discriminator as Trakt spells it.
    pub fn kind(&self) -> &str {
        match self {
            Media::Movie(_) => "movie",
            Media::Episode { .. } => "episode",
            Media::Other(kind) => kind,
        }
    }
}

/// One entry of `GET /sync/history`. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawHistoryRecord")]
pub struct HistoryRecord {
    pub id: i64,
    pub watched_at: DateTime<Utc>,
    pub action: String,
    pub media: Media,
}

/// Wire shape: the `type` field selects which of the optional objects is set.
#[derive(Deserialize)]
struct RawHistoryRecord {
    id: i64,
    watched_at: DateTime<Utc>,
    #[serde(default)]
    action: String,
    #[serde(rename = "type")]
    kind: String,
    movie: Option<Movie>,
    episode: Option<Episode>,
    show: Option<Show>,
}

impl From<RawHistoryRecord> for HistoryRecord {
    fn from(raw: RawHistoryRecord) -> Self {
        let media = match (raw.kind.as_str(), raw.movie, raw.episode, raw.show) {
            ("movie", Some(movie), _, _) => Media::Movie(movie),
            ("episode", _, Some(episode), Some(show)) => Media::Episode { episode, show },
            _ => Media::Other(raw.kind),
        };

        Self {
            id: raw.id,
            watched_at: raw.watched_at,
            action: raw.action,
            media,
        }
    }
}
