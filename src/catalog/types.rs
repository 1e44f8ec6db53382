//! SoundCloud record types
//!
//! Records arrive in two shapes: the public API (`kind`, numeric `id`,
//! nested `user`) and the mobile API (`urn` = `type:kind:id`, nested
//! `_embedded.user`). Both deserialize into the same structs.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize an identifier that may be a number, a string or null
fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    flexible_string(deserializer, "an id as number, string or null")
}

/// Deserialize a release year that may be a number, a string or null
fn deserialize_flexible_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    flexible_string(deserializer, "a year as number, string or null")
}

fn flexible_string<'de, D>(deserializer: D, expecting: &'static str) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct FlexibleStringVisitor(&'static str);

    impl<'de> de::Visitor<'de> for FlexibleStringVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str(self.0)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(Some(value.to_string()))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(FlexibleStringVisitor(expecting))
}

/// Deserialize a duration that may be missing or null
fn deserialize_duration<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

/// The uploader as embedded in track and playlist records
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Mobile API `_embedded` block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Embedded {
    #[serde(default)]
    pub user: Option<UserRef>,
}

/// A `user` record
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "deserialize_flexible_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub urn: Option<String>,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A `track` record
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRecord {
    #[serde(default, deserialize_with = "deserialize_flexible_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub urn: Option<String>,
    pub title: String,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// Duration in milliseconds
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: u64,
    #[serde(default, deserialize_with = "deserialize_flexible_year")]
    pub release_year: Option<String>,
    /// e.g. "2013/03/24 00:32:01 +0000"
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default, rename = "_embedded")]
    pub embedded: Option<Embedded>,
}

/// A `playlist` record
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistRecord {
    #[serde(default, deserialize_with = "deserialize_flexible_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub urn: Option<String>,
    pub title: String,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default, rename = "_embedded")]
    pub embedded: Option<Embedded>,
}

impl TrackRecord {
    /// The uploader, whichever API shape the record came from
    pub fn uploader(&self) -> Option<&UserRef> {
        uploader(&self.user, &self.embedded)
    }

    pub fn record_id(&self) -> Option<String> {
        record_id(&self.id, &self.urn)
    }
}

impl PlaylistRecord {
    pub fn uploader(&self) -> Option<&UserRef> {
        uploader(&self.user, &self.embedded)
    }

    pub fn record_id(&self) -> Option<String> {
        record_id(&self.id, &self.urn)
    }
}

impl UserRecord {
    pub fn record_id(&self) -> Option<String> {
        record_id(&self.id, &self.urn)
    }
}

fn uploader<'a>(user: &'a Option<UserRef>, embedded: &'a Option<Embedded>) -> Option<&'a UserRef> {
    user.as_ref()
        .or_else(|| embedded.as_ref().and_then(|e| e.user.as_ref()))
}

fn record_id(id: &Option<String>, urn: &Option<String>) -> Option<String> {
    match id {
        Some(id) if !id.is_empty() => Some(id.clone()),
        _ => urn.as_deref().and_then(urn_id).map(String::from),
    }
}

/// The id segment of a compound `type:kind:id` identifier
pub fn urn_id(urn: &str) -> Option<&str> {
    urn.split(':').nth(2).filter(|id| !id.is_empty())
}

/// The kind segment of a `type:kind:id` identifier, singularized
fn urn_kind(urn: &str) -> Option<String> {
    let kind = urn.split(':').nth(1)?;
    let singular = match kind {
        "tracks" => "track",
        "users" => "user",
        "playlists" => "playlist",
        other => other,
    };
    Some(singular.to_string())
}

/// A collection record, dispatched on its kind discriminator
#[derive(Debug, Clone)]
pub enum Record {
    User(UserRecord),
    Track(TrackRecord),
    Playlist(PlaylistRecord),
    /// A kind without a mapping; carries the discriminator
    Unknown(String),
}

impl Record {
    /// Discriminator of a raw record: `kind`, else derived from `urn`
    pub fn kind_of(raw: &Value) -> String {
        if let Some(kind) = raw.get("kind").and_then(Value::as_str) {
            return kind.to_string();
        }
        raw.get("urn")
            .and_then(Value::as_str)
            .and_then(urn_kind)
            .unwrap_or_default()
    }

    /// Decode a raw record. Fails only when a known kind is malformed.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        let kind = Self::kind_of(&raw);
        let record = match kind.as_str() {
            "user" => Record::User(serde_json::from_value(raw)?),
            "track" => Record::Track(serde_json::from_value(raw)?),
            "playlist" => Record::Playlist(serde_json::from_value(raw)?),
            _ => Record::Unknown(kind),
        };
        Ok(record)
    }
}
