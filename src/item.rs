//! Navigable items returned to the host
//!
//! Items are plain values built fresh for every request. The host decides
//! how to render them; the only behaviour here is construction and the
//! container/playable capability queries.

use serde::Serialize;

/// A navigable container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryItem {
    pub label: String,
    pub target_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fanart: Option<String>,
}

impl DirectoryItem {
    pub fn new(label: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target_uri: target_uri.into(),
            image: None,
            fanart: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_fanart(mut self, fanart: Option<String>) -> Self {
        self.fanart = fanart;
        self
    }
}

/// A terminal, playable entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioItem {
    pub label: String,
    pub target_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fanart: Option<String>,
    pub title: String,
    pub genre: String,
    pub duration_ms: u64,
    pub artist_name: String,
    pub year: String,
}

impl AudioItem {
    pub fn new(label: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target_uri: target_uri.into(),
            image: None,
            fanart: None,
            title: String::new(),
            genre: String::new(),
            duration_ms: 0,
            artist_name: String::new(),
            year: String::new(),
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_fanart(mut self, fanart: Option<String>) -> Self {
        self.fanart = fanart;
        self
    }
}

/// Synthetic "next page" directory
///
/// Activating it re-dispatches the original path with `page` set to
/// [`ContinuationItem::page`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinuationItem {
    pub page: u32,
    pub target_uri: String,
}

impl ContinuationItem {
    pub fn new(page: u32, target_uri: impl Into<String>) -> Self {
        Self {
            page,
            target_uri: target_uri.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("Next page ({})", self.page)
    }
}

/// One entry of a navigation listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Item {
    Directory(DirectoryItem),
    Audio(AudioItem),
    Continuation(ContinuationItem),
}

impl Item {
    /// Containers can be navigated into (continuations included)
    pub fn is_container(&self) -> bool {
        matches!(self, Item::Directory(_) | Item::Continuation(_))
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, Item::Audio(_))
    }

    pub fn label(&self) -> String {
        match self {
            Item::Directory(item) => item.label.clone(),
            Item::Audio(item) => item.label.clone(),
            Item::Continuation(item) => item.label(),
        }
    }

    pub fn target_uri(&self) -> &str {
        match self {
            Item::Directory(item) => &item.target_uri,
            Item::Audio(item) => &item.target_uri,
            Item::Continuation(item) => &item.target_uri,
        }
    }
}

impl From<DirectoryItem> for Item {
    fn from(item: DirectoryItem) -> Self {
        Item::Directory(item)
    }
}

impl From<AudioItem> for Item {
    fn from(item: AudioItem) -> Self {
        Item::Audio(item)
    }
}

impl From<ContinuationItem> for Item {
    fn from(item: ContinuationItem) -> Self {
        Item::Continuation(item)
    }
}

/// What a handler resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Navigation {
    /// An ordered listing
    Listing(Vec<Item>),
    /// A direct-playback endpoint
    Playable(AudioItem),
}

impl Navigation {
    /// Items of a listing; a playable result yields itself as a single item
    pub fn into_items(self) -> Vec<Item> {
        match self {
            Navigation::Listing(items) => items,
            Navigation::Playable(item) => vec![Item::Audio(item)],
        }
    }
}
