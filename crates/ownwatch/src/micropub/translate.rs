//! History record → publishable watch event.
//!
//! Translation is pure: no I/O, no clock. The Micropub body is rendered from
//! the event by [`WatchEvent::to_mf2`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use super::error::UnsupportedRecordKind;
use crate::trakt::{HistoryRecord, Media, MediaIds};

/// Base for the public pages that citations link to.
pub const TRAKT_WEB_URL: &str = "https://trakt.tv";

/// A cited work: a movie, a show, or an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub name: String,
    pub year: Option<i32>,
    pub url: String,
    pub ids: MediaIds,
}

/// What was watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    Movie(Citation),
    Episode {
        episode: Citation,
        season: u32,
        number: u32,
        /// The show the episode belongs to, cited as its parent.
        show: Citation,
    },
}

/// A normalized watch, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// ID of the history record this event came from.
    pub source_id: i64,
    pub published_at: DateTime<Utc>,
    pub summary: String,
    pub watch_of: MediaReference,
}

/// Translate one history record.
///
/// Only movies and episodes are publishable; any other kind is rejected.
/// A missing slug produces a degenerate URL rather than an error.
pub fn translate(record: &HistoryRecord) -> Result<WatchEvent, UnsupportedRecordKind> {
    let (summary, watch_of) = match &record.media {
        Media::Movie(movie) => (
            format!("Just watched: {}", movie.title),
            MediaReference::Movie(Citation {
                name: movie.title.clone(),
                year: movie.year,
                url: format!("{TRAKT_WEB_URL}/movies/{}", slug(&movie.ids)),
                ids: movie.ids.clone(),
            }),
        ),
        Media::Episode { episode, show } => {
            let title = episode.title.clone().unwrap_or_default();
            let show_url = format!("{TRAKT_WEB_URL}/shows/{}", slug(&show.ids));
            (
                format!(
                    "Just watched: {} ({} S{}E{})",
                    title, show.title, episode.season, episode.number
                ),
                MediaReference::Episode {
                    episode: Citation {
                        name: title,
                        year: None,
                        url: format!(
                            "{show_url}/seasons/{}/episodes/{}",
                            episode.season, episode.number
                        ),
                        ids: episode.ids.clone(),
                    },
                    season: episode.season,
                    number: episode.number,
                    show: Citation {
                        name: show.title.clone(),
                        year: show.year,
                        url: show_url,
                        ids: show.ids.clone(),
                    },
                },
            )
        }
        Media::Other(kind) => return Err(UnsupportedRecordKind(kind.clone())),
    };

    Ok(WatchEvent {
        source_id: record.id,
        published_at: record.watched_at,
        summary,
        watch_of,
    })
}

fn slug(ids: &MediaIds) -> &str {
    ids.slug.as_deref().unwrap_or_default()
}

impl WatchEvent {
    /// `published` as the destination expects it: RFC 3339, whole seconds, UTC.
    pub fn published(&self) -> String {
        self.published_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Render as a Micropub JSON (microformats2) `h-entry`.
    pub fn to_mf2(&self) -> Value {
        let mut cite = match &self.watch_of {
            MediaReference::Movie(movie) => citation_properties(movie),
            MediaReference::Episode {
                episode,
                season,
                number,
                show,
            } => {
                let mut props = citation_properties(episode);
                props["season"] = json!([season]);
                props["episode"] = json!([number]);
                props["show"] = json!([h_cite(citation_properties(show))]);
                props
            }
        };
        cite["trakt-id"] = json!([self.source_id]);

        json!({
            "type": ["h-entry"],
            "properties": {
                "published": [self.published()],
                "summary": [self.summary],
                "watch-of": [h_cite(cite)],
            }
        })
    }
}

fn citation_properties(citation: &Citation) -> Value {
    let mut props = json!({
        "name": [citation.name],
        "url": [citation.url],
        "ids": [citation.ids],
    });
    if let Some(year) = citation.year {
        props["year"] = json!([year]);
    }
    props
}

fn h_cite(properties: Value) -> Value {
    json!({ "type": ["h-cite"], "properties": properties })
}
