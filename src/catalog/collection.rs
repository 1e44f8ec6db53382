//! Collection transformer
//!
//! Turns a raw catalog page into an ordered item listing: each record is
//! mapped by kind, artwork and year are derived, and a continuation item is
//! appended when the payload advertises a next page.
//!
//! Unknown kinds are handled by one [`UnknownKindPolicy`] for every call
//! site, including the activity stream.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{PlaylistRecord, Record, TrackRecord, UserRecord, UserRef};
use crate::error::{NavError, Result};
use crate::item::{AudioItem, ContinuationItem, DirectoryItem, Item};
use crate::routing::{create_uri, next_page_uri, Params};

static LARGE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)-large\.jpg(\?.*)?$").expect("valid image pattern"));

static LEADING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<year>\d{4})").expect("valid year pattern"));

/// Which API shape a payload has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadVariant {
    /// `{collection, next_href}`, records with `kind` and numeric `id`
    Api,
    /// `{collection, _links: {next: {href}}}`, records with `urn`
    Mobile,
}

impl PayloadVariant {
    /// The next-page indicator, if present and non-empty
    pub fn next_href<'a>(&self, payload: &'a Value) -> Option<&'a str> {
        let href = match self {
            PayloadVariant::Api => payload.get("next_href"),
            PayloadVariant::Mobile => payload.pointer("/_links/next/href"),
        };
        href.and_then(Value::as_str).filter(|h| !h.is_empty())
    }
}

/// What to do with a record whose kind has no mapping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKindPolicy {
    /// Leave it out and count it
    #[default]
    Skip,
    /// Fail the whole listing with `UnknownItemKind`
    Fail,
}

/// Maps raw catalog records to items
pub struct CollectionTransformer {
    policy: UnknownKindPolicy,
    fanart: Option<String>,
    /// Records left out under `UnknownKindPolicy::Skip`
    skipped: AtomicU64,
}

impl CollectionTransformer {
    pub fn new(policy: UnknownKindPolicy, fanart: Option<String>) -> Self {
        Self {
            policy,
            fanart,
            skipped: AtomicU64::new(0),
        }
    }

    /// Transform a collection page and append pagination
    ///
    /// The continuation replays `path` and `params` with the page
    /// incremented. It is only added when the raw collection was non-empty
    /// and the payload carries a next-page indicator.
    pub fn transform(
        &self,
        payload: &Value,
        variant: PayloadVariant,
        path: &str,
        params: &Params,
    ) -> Result<Vec<Item>> {
        let records = records_of(payload);
        let raw_count = records.len();
        let mut items = self.transform_records(records)?;

        if raw_count > 0 && variant.next_href(payload).is_some() {
            match next_page_uri(path, params) {
                Some((next, uri)) => {
                    debug!(path = path, next_page = next, "Appending continuation");
                    items.push(ContinuationItem::new(next, uri).into());
                }
                None => warn!(path = path, "Page number exhausted, no continuation"),
            }
        }

        Ok(items)
    }

    /// Map records in order, without pagination
    pub fn transform_records<I>(&self, records: I) -> Result<Vec<Item>>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut items = Vec::new();
        for raw in records {
            if let Some(item) = self.map_record(raw)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Transform an activity stream page
    ///
    /// Stream entries wrap a track or playlist under a `type` discriminator.
    /// The stream paginates with a cursor, which is not supported, so no
    /// continuation is ever appended.
    pub fn transform_stream(&self, payload: &Value) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        for entry in records_of(payload) {
            let entry_type = entry.get("type").and_then(Value::as_str).unwrap_or_default();
            let nested = match entry_type {
                "track" | "track-repost" => entry.get("track"),
                "playlist" | "playlist-repost" => entry.get("playlist"),
                _ => None,
            };

            let item = match nested {
                Some(record) => self.map_known(entry_type, record.clone())?,
                None => self.unknown(entry_type)?,
            };
            items.extend(item);
        }

        if PayloadVariant::Api.next_href(payload).is_some() {
            debug!("Stream has a next cursor; cursor pagination is not supported");
        }
        Ok(items)
    }

    /// Map a single record by its kind
    pub fn map_record(&self, raw: Value) -> Result<Option<Item>> {
        let kind = Record::kind_of(&raw);
        let record = Record::from_value(raw).map_err(|e| {
            NavError::RemoteLookupFailure(format!("malformed '{}' record: {}", kind, e))
        })?;

        let item = match record {
            Record::User(user) => Some(self.user_item(&user)?.into()),
            Record::Track(track) => Some(self.track_item(&track)?.into()),
            Record::Playlist(playlist) => Some(self.playlist_item(&playlist)?.into()),
            Record::Unknown(kind) => self.unknown(&kind)?,
        };
        Ok(item)
    }

    /// Map a record nested in a stream entry; its kind is known from the entry
    fn map_known(&self, entry_type: &str, mut raw: Value) -> Result<Option<Item>> {
        if raw.get("kind").is_none() {
            if let Some(obj) = raw.as_object_mut() {
                let kind = entry_type.trim_end_matches("-repost");
                obj.insert("kind".to_string(), Value::String(kind.to_string()));
            }
        }
        self.map_record(raw)
    }

    fn unknown(&self, kind: &str) -> Result<Option<Item>> {
        match self.policy {
            UnknownKindPolicy::Skip => {
                let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(kind = kind, skipped = skipped, "Skipping record of unknown kind");
                Ok(None)
            }
            UnknownKindPolicy::Fail => Err(NavError::UnknownItemKind(kind.to_string())),
        }
    }

    pub fn user_item(&self, user: &UserRecord) -> Result<DirectoryItem> {
        let id = user.record_id().ok_or_else(|| {
            NavError::RemoteLookupFailure(format!("user '{}' has no id", user.username))
        })?;

        Ok(DirectoryItem::new(&user.username, create_uri(&["user", id.as_str()], &Params::new()))
            .with_image(resolve_image(user.avatar_url.as_deref(), None))
            .with_fanart(self.fanart.clone()))
    }

    pub fn track_item(&self, track: &TrackRecord) -> Result<AudioItem> {
        let id = track.record_id().ok_or_else(|| {
            NavError::RemoteLookupFailure(format!("track '{}' has no id", track.title))
        })?;

        let mut params = Params::new();
        params.insert("id".to_string(), id);

        let mut item = AudioItem::new(&track.title, create_uri(&["play"], &params))
            .with_image(track_image(track))
            .with_fanart(self.fanart.clone());
        item.title = track.title.clone();
        item.genre = track.genre.clone().unwrap_or_default();
        item.duration_ms = track.duration;
        item.artist_name = track
            .uploader()
            .and_then(|u| u.username.clone())
            .unwrap_or_default();
        item.year = infer_year(track.release_year.as_deref(), track.created_at.as_deref());
        Ok(item)
    }

    pub fn playlist_item(&self, playlist: &PlaylistRecord) -> Result<DirectoryItem> {
        let id = playlist.record_id().ok_or_else(|| {
            NavError::RemoteLookupFailure(format!("playlist '{}' has no id", playlist.title))
        })?;

        // Without artwork or an uploader avatar, borrow the first track's image
        let image = resolve_image(playlist.artwork_url.as_deref(), playlist.uploader())
            .or_else(|| playlist.tracks.first().and_then(track_image));

        Ok(DirectoryItem::new(&playlist.title, create_uri(&["playlist", id.as_str()], &Params::new()))
            .with_image(image)
            .with_fanart(self.fanart.clone()))
    }

    /// Number of records skipped for an unknown kind so far
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn fanart(&self) -> Option<String> {
        self.fanart.clone()
    }
}

/// Records of a payload: a bare array, or its `collection` array
fn records_of(payload: &Value) -> Vec<Value> {
    let records = match payload {
        Value::Array(records) => Some(records),
        other => other.get("collection").and_then(Value::as_array),
    };
    records.cloned().unwrap_or_default()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

fn track_image(track: &TrackRecord) -> Option<String> {
    resolve_image(track.artwork_url.as_deref(), track.uploader())
}

/// Artwork for an item: the direct URL, else the uploader's avatar,
/// rewritten to high resolution. Absent when neither exists.
pub fn resolve_image(direct: Option<&str>, uploader: Option<&UserRef>) -> Option<String> {
    non_empty(direct)
        .or_else(|| non_empty(uploader.and_then(|u| u.avatar_url.as_deref())))
        .map(hires_image)
}

/// Rewrite a `-large.jpg` image URL to its 500x500 variant, dropping any
/// query string. Other URLs are returned unchanged.
pub fn hires_image(url: &str) -> String {
    LARGE_IMAGE.replace(url, "${1}-t500x500.jpg").into_owned()
}

/// Release year if set, else the leading year of the creation timestamp
pub fn infer_year(release_year: Option<&str>, created_at: Option<&str>) -> String {
    if let Some(year) = non_empty(release_year) {
        return year.to_string();
    }
    created_at
        .and_then(|c| LEADING_YEAR.captures(c))
        .and_then(|caps| caps.name("year"))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
