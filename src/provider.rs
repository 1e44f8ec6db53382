//! SoundCloud navigation provider
//!
//! Binds the route table to handlers. Handlers fetch through the remote
//! call cache where a listing is worth memoizing and hand the payload to
//! the collection transformer.

use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{ttl, FunctionCache};
use crate::catalog::types::PlaylistRecord;
use crate::catalog::{Catalog, CollectionTransformer, PayloadVariant, UnknownKindPolicy};
use crate::error::{NavError, Result};
use crate::item::{AudioItem, DirectoryItem, Item, Navigation};
use crate::routing::{create_uri, page_param, split_uri, NavRequest, Params, Router};

/// Resolves navigation paths against a catalog
pub struct Provider<C: Catalog> {
    catalog: C,
    cache: FunctionCache,
    transformer: CollectionTransformer,
    router: Router<Provider<C>>,
}

impl<C: Catalog> Provider<C> {
    pub fn new(
        catalog: C,
        cache: FunctionCache,
        unknown_kinds: UnknownKindPolicy,
        fanart: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            catalog,
            cache,
            transformer: CollectionTransformer::new(unknown_kinds, fanart),
            router: Self::routes()?,
        })
    }

    /// The route table, most specific patterns first
    fn routes() -> Result<Router<Self>> {
        let mut router = Router::new();
        router.register(r"^/play/$", Self::on_play)?;
        router.register(r"^/explore/trending/((?P<category>\w+)/)?$", Self::on_explore_trending)?;
        router.register(
            r"^/explore/genre/((?P<category>\w+)/)((?P<genre>.+)/)?$",
            Self::on_explore_genre,
        )?;
        router.register(r"^/explore/?$", Self::on_explore)?;
        router.register(r"^/playlists/(?P<user_id>[^/]+)/$", Self::on_playlists)?;
        router.register(r"^/playlist/(?P<playlist_id>[^/]+)/$", Self::on_playlist)?;
        router.register(r"^/user/(?P<user_id>[^/]+)/$", Self::on_user)?;
        router.register(r"^/stream/$", Self::on_stream)?;
        router.register(r"^/search/query/$", Self::on_search)?;
        router.register(r"^/$", Self::on_root)?;
        debug!(routes = router.routes().len(), "Route table ready");
        Ok(router)
    }

    /// Resolve a navigation request
    ///
    /// The path gets a leading and a trailing slash if it lacks them.
    pub fn navigate(&self, path: &str, params: &Params) -> Result<Navigation> {
        let path = normalize_path(path);
        debug!(path = %path, params = ?params, "Navigating");
        self.router.dispatch(self, &path, params)
    }

    /// Resolve a full `path?query` URI, such as an item's target
    pub fn navigate_uri(&self, uri: &str) -> Result<Navigation> {
        let (path, params) = split_uri(uri);
        self.navigate(&path, &params)
    }

    /// Follow an item, e.g. a continuation to its next page
    pub fn open(&self, item: &Item) -> Result<Navigation> {
        debug!(
            label = %item.label(),
            container = item.is_container(),
            "Opening item"
        );
        self.navigate_uri(item.target_uri())
    }

    /// Tear down, closing the durable cache
    pub fn close(self) -> Result<()> {
        info!(skipped_records = self.transformer.skipped(), "Closing provider");
        self.cache.close()?;
        Ok(())
    }

    fn directory(&self, label: &str, segments: &[&str]) -> Item {
        DirectoryItem::new(label, create_uri(segments, &Params::new()))
            .with_fanart(self.transformer.fanart())
            .into()
    }

    fn on_play(&self, req: &NavRequest<'_>) -> Result<Navigation> {
        let track_id = req
            .params
            .get("id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| NavError::MissingParameter("id".to_string()))?;

        let json = self.catalog.track_url(track_id)?;
        let location = json
            .get("location")
            .and_then(Value::as_str)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                NavError::RemoteLookupFailure(format!(
                    "no playback location for track '{}'",
                    track_id
                ))
            })?;

        Ok(Navigation::Playable(AudioItem::new(track_id.as_str(), location)))
    }

    fn on_explore_trending(&self, req: &NavRequest<'_>) -> Result<Navigation> {
        let category = req.route.get("category");
        let page = page_param(req.params);

        let json: Value = self.cache.call_cached(
            "get_trending",
            &(category, page),
            ttl::ONE_HOUR,
            || Ok::<_, NavError>(self.catalog.trending(category, page)?),
        )?;

        let items = self
            .transformer
            .transform(&json, PayloadVariant::Mobile, req.path, req.params)?;
        Ok(Navigation::Listing(items))
    }

    fn on_explore_genre(&self, req: &NavRequest<'_>) -> Result<Navigation> {
        let category = req.route.require("category")?;

        let Some(genre) = req.route.get("genre") else {
            return self.list_genres(category);
        };

        let page = page_param(req.params);
        let json: Value = self.cache.call_cached(
            "get_genre",
            &(genre, page),
            ttl::ONE_HOUR,
            || Ok::<_, NavError>(self.catalog.genre(genre, page)?),
        )?;

        let items = self
            .transformer
            .transform(&json, PayloadVariant::Mobile, req.path, req.params)?;
        Ok(Navigation::Listing(items))
    }

    /// Sub-genres of a category, from the taxonomy
    fn list_genres(&self, category: &str) -> Result<Navigation> {
        let json: Value = self.cache.call_cached(
            "get_categories",
            &(),
            ttl::ONE_DAY,
            || Ok::<_, NavError>(self.catalog.categories()?),
        )?;

        let genres = json
            .get(category)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut items = Vec::with_capacity(genres.len());
        for genre in genres {
            let title = genre.get("title").and_then(Value::as_str).ok_or_else(|| {
                NavError::RemoteLookupFailure(format!("genre in '{}' has no title", category))
            })?;
            items.push(self.directory(title, &["explore", "genre", category, title]));
        }
        Ok(Navigation::Listing(items))
    }

    fn on_explore(&self, _req: &NavRequest<'_>) -> Result<Navigation> {
        Ok(Navigation::Listing(vec![
            self.directory("Trending Music", &["explore", "trending", "music"]),
            self.directory("Trending Audio", &["explore", "trending", "audio"]),
            self.directory("Music Genres", &["explore", "genre", "music"]),
            self.directory("Audio Genres", &["explore", "genre", "audio"]),
        ]))
    }

    fn on_playlists(&self, req: &NavRequest<'_>) -> Result<Navigation> {
        let user_id = req.route.require("user_id")?;
        let json = self.catalog.playlists(user_id)?;
        let items = self
            .transformer
            .transform(&json, PayloadVariant::Api, req.path, req.params)?;
        Ok(Navigation::Listing(items))
    }

    fn on_playlist(&self, req: &NavRequest<'_>) -> Result<Navigation> {
        let playlist_id = req.route.require("playlist_id")?;
        let json = self.catalog.playlist(playlist_id)?;
        let playlist: PlaylistRecord = serde_json::from_value(json).map_err(|e| {
            NavError::RemoteLookupFailure(format!("malformed playlist '{}': {}", playlist_id, e))
        })?;

        let items = playlist
            .tracks
            .iter()
            .map(|track| self.transformer.track_item(track).map(Item::from))
            .collect::<Result<Vec<_>>>()?;
        Ok(Navigation::Listing(items))
    }

    fn on_user(&self, req: &NavRequest<'_>) -> Result<Navigation> {
        let user_id = req.route.require("user_id")?;
        let page = page_param(req.params);

        let json: Value = self.cache.call_cached(
            "get_user_tracks",
            &(user_id, page),
            ttl::ONE_MINUTE,
            || Ok::<_, NavError>(self.catalog.user_tracks(user_id, page)?),
        )?;

        let items = self
            .transformer
            .transform(&json, PayloadVariant::Api, req.path, req.params)?;
        Ok(Navigation::Listing(items))
    }

    fn on_stream(&self, _req: &NavRequest<'_>) -> Result<Navigation> {
        let json = self.catalog.stream()?;
        Ok(Navigation::Listing(self.transformer.transform_stream(&json)?))
    }

    fn on_search(&self, req: &NavRequest<'_>) -> Result<Navigation> {
        let query = req
            .params
            .get("q")
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| NavError::MissingParameter("q".to_string()))?;
        let page = page_param(req.params);

        let json: Value = self.cache.call_cached(
            "search",
            &(query, page),
            ttl::ONE_MINUTE,
            || Ok::<_, NavError>(self.catalog.search(query, page)?),
        )?;

        let items = self
            .transformer
            .transform(&json, PayloadVariant::Api, req.path, req.params)?;
        Ok(Navigation::Listing(items))
    }

    fn on_root(&self, _req: &NavRequest<'_>) -> Result<Navigation> {
        let signed_in = self.catalog.is_signed_in();

        let mut items = vec![self.directory("Search", &["search", "query"])];
        if signed_in {
            items.push(self.directory("Stream", &["stream"]));
        }
        items.push(self.directory("Explore", &["explore"]));
        if signed_in {
            items.push(self.directory("Playlists", &["playlists", "me"]));
        }
        Ok(Navigation::Listing(items))
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeCatalog {
        signed_in: bool,
        location: Option<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeCatalog {
        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    fn mobile_page(ids: &[u64], next: bool) -> Value {
        let collection: Vec<Value> = ids
            .iter()
            .map(|id| json!({"urn": format!("soundcloud:tracks:{}", id), "title": format!("Track {}", id)}))
            .collect();
        let mut page = json!({"collection": collection});
        if next {
            page["_links"] = json!({"next": {"href": "https://api-mobile.soundcloud.com/next"}});
        }
        page
    }

    impl Catalog for FakeCatalog {
        fn trending(&self, category: Option<&str>, page: u32) -> std::result::Result<Value, CatalogError> {
            self.record(format!("trending:{}:{}", category.unwrap_or("-"), page));
            Ok(mobile_page(&[1, 2], true))
        }

        fn genre(&self, genre: &str, page: u32) -> std::result::Result<Value, CatalogError> {
            self.record(format!("genre:{}:{}", genre, page));
            Ok(mobile_page(&[10], false))
        }

        fn categories(&self) -> std::result::Result<Value, CatalogError> {
            self.record("categories".to_string());
            Ok(json!({
                "music": [{"title": "House"}, {"title": "Techno"}],
                "audio": [{"title": "Comedy"}]
            }))
        }

        fn search(&self, query: &str, page: u32) -> std::result::Result<Value, CatalogError> {
            self.record(format!("search:{}:{}", query, page));
            Ok(json!({
                "collection": [{"kind": "user", "id": 4, "username": "house-dj"}],
                "next_href": "https://api.soundcloud.com/search?offset=50"
            }))
        }

        fn track_url(&self, track_id: &str) -> std::result::Result<Value, CatalogError> {
            self.record(format!("track_url:{}", track_id));
            Ok(match self.location {
                Some(location) => json!({"status": "302 - Found", "location": location}),
                None => json!({"status": "404 - Not Found"}),
            })
        }

        fn playlists(&self, user_id: &str) -> std::result::Result<Value, CatalogError> {
            self.record(format!("playlists:{}", user_id));
            Ok(json!([{"kind": "playlist", "id": 8, "title": "Mix", "tracks": []}]))
        }

        fn playlist(&self, playlist_id: &str) -> std::result::Result<Value, CatalogError> {
            self.record(format!("playlist:{}", playlist_id));
            Ok(json!({
                "kind": "playlist",
                "id": 8,
                "title": "Mix",
                "tracks": [{"kind": "track", "id": 1, "title": "A"}, {"kind": "track", "id": 2, "title": "B"}]
            }))
        }

        fn user_tracks(&self, user_id: &str, page: u32) -> std::result::Result<Value, CatalogError> {
            self.record(format!("user_tracks:{}:{}", user_id, page));
            Ok(json!({"collection": [{"kind": "track", "id": 3, "title": "C"}]}))
        }

        fn stream(&self) -> std::result::Result<Value, CatalogError> {
            self.record("stream".to_string());
            Ok(json!({"collection": [{"type": "track", "track": {"id": 5, "title": "E"}}]}))
        }

        fn is_signed_in(&self) -> bool {
            self.signed_in
        }
    }

    fn provider(catalog: FakeCatalog, dir: &std::path::Path) -> Provider<FakeCatalog> {
        let cache = FunctionCache::open(dir).unwrap();
        Provider::new(catalog, cache, UnknownKindPolicy::Skip, None).unwrap()
    }

    fn listing(nav: Navigation) -> Vec<Item> {
        match nav {
            Navigation::Listing(items) => items,
            Navigation::Playable(item) => panic!("expected a listing, got {:?}", item),
        }
    }

    #[test]
    fn test_root_depends_on_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog::default(), dir.path());
        let items = listing(p.navigate("/", &Params::new()).unwrap());
        let targets: Vec<_> = items.iter().map(|i| i.target_uri().to_string()).collect();
        assert_eq!(targets, vec!["/search/query/", "/explore/"]);

        let p = provider(FakeCatalog { signed_in: true, ..Default::default() }, dir.path());
        let items = listing(p.navigate("", &Params::new()).unwrap());
        assert_eq!(items.len(), 4);
        assert_eq!(items[1].target_uri(), "/stream/");
        assert_eq!(items[3].target_uri(), "/playlists/me/");
    }

    #[test]
    fn test_explore_with_and_without_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog::default(), dir.path());

        for path in ["/explore", "/explore/"] {
            let items = listing(p.navigate(path, &Params::new()).unwrap());
            assert_eq!(items.len(), 4);
            assert_eq!(items[2].target_uri(), "/explore/genre/music/");
        }
        assert!(p.catalog.calls().is_empty());
    }

    #[test]
    fn test_genre_two_levels() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog::default(), dir.path());

        let genres = listing(p.navigate("/explore/genre/music/", &Params::new()).unwrap());
        let labels: Vec<_> = genres.iter().map(Item::label).collect();
        assert_eq!(labels, vec!["House", "Techno"]);
        assert_eq!(genres[0].target_uri(), "/explore/genre/music/House/");

        let tracks = listing(p.navigate("/explore/genre/music/house/", &Params::new()).unwrap());
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_playable());

        assert_eq!(p.catalog.calls(), vec!["categories", "genre:house:1"]);
    }

    #[test]
    fn test_trending_is_cached_and_paginates() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog::default(), dir.path());

        let first = listing(p.navigate("/explore/trending/music/", &Params::new()).unwrap());
        let second = listing(p.navigate("/explore/trending/music/", &Params::new()).unwrap());
        assert_eq!(first, second);
        assert_eq!(p.catalog.calls(), vec!["trending:music:1"]);

        let Some(Item::Continuation(next)) = first.last() else {
            panic!("expected a continuation item");
        };
        assert_eq!(next.page, 2);

        // Following the continuation fetches page 2
        let page_two = listing(p.open(first.last().unwrap()).unwrap());
        assert_eq!(page_two.len(), 3);
        assert_eq!(p.catalog.calls(), vec!["trending:music:1", "trending:music:2"]);
    }

    #[test]
    fn test_cache_survives_provider_restart() {
        let dir = tempfile::tempdir().unwrap();

        let p = provider(FakeCatalog::default(), dir.path());
        p.navigate("/explore/genre/audio/", &Params::new()).unwrap();
        p.close().unwrap();

        let p = provider(FakeCatalog::default(), dir.path());
        let genres = listing(p.navigate("/explore/genre/audio/", &Params::new()).unwrap());
        assert_eq!(genres.len(), 1);
        assert!(p.catalog.calls().is_empty());
    }

    #[test]
    fn test_play() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(
            FakeCatalog {
                location: Some("https://cf-media.sndcdn.com/a.mp3"),
                ..Default::default()
            },
            dir.path(),
        );

        let nav = p.navigate_uri("/play/?id=42").unwrap();
        let Navigation::Playable(item) = nav else {
            panic!("expected a playable item");
        };
        assert_eq!(item.label, "42");
        assert_eq!(item.target_uri, "https://cf-media.sndcdn.com/a.mp3");
    }

    #[test]
    fn test_play_failures() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog::default(), dir.path());

        let err = p.navigate("/play/", &Params::new()).unwrap_err();
        assert!(matches!(err, NavError::MissingParameter(ref name) if name == "id"));
        assert!(err.is_request_error());
        assert!(p.catalog.calls().is_empty());

        let err = p.navigate_uri("/play/?id=42").unwrap_err();
        assert!(matches!(err, NavError::RemoteLookupFailure(_)));
        assert_eq!(p.catalog.calls(), vec!["track_url:42"]);
    }

    #[test]
    fn test_search() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog::default(), dir.path());

        let err = p.navigate("/search/query/", &Params::new()).unwrap_err();
        assert!(matches!(err, NavError::MissingParameter(ref name) if name == "q"));

        let items = listing(p.navigate_uri("/search/query/?q=house&page=2").unwrap());
        assert_eq!(items[0].target_uri(), "/user/4/");
        assert_eq!(items[1].target_uri(), "/search/query/?page=3&q=house");
        assert_eq!(p.catalog.calls(), vec!["search:house:2"]);
    }

    #[test]
    fn test_playlists_and_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog { signed_in: true, ..Default::default() }, dir.path());

        let playlists = listing(p.navigate("/playlists/me/", &Params::new()).unwrap());
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].target_uri(), "/playlist/8/");

        let tracks = listing(p.open(&playlists[0]).unwrap());
        let targets: Vec<_> = tracks.iter().map(|i| i.target_uri().to_string()).collect();
        assert_eq!(targets, vec!["/play/?id=1", "/play/?id=2"]);
    }

    #[test]
    fn test_open_container_and_playable() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(
            FakeCatalog {
                location: Some("https://cf-media.sndcdn.com/c.mp3"),
                ..Default::default()
            },
            dir.path(),
        );

        let tracks = listing(p.navigate("/user/4/", &Params::new()).unwrap());
        assert!(!tracks[0].is_container());

        let Navigation::Playable(item) = p.open(&tracks[0]).unwrap() else {
            panic!("expected a playable item");
        };
        assert_eq!(item.target_uri, "https://cf-media.sndcdn.com/c.mp3");

        let explore = listing(p.navigate("/explore/", &Params::new()).unwrap());
        assert!(explore[0].is_container());
        assert!(matches!(p.open(&explore[0]).unwrap(), Navigation::Listing(_)));
    }

    #[test]
    fn test_user_and_stream() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog { signed_in: true, ..Default::default() }, dir.path());

        let tracks = listing(p.navigate("/user/4/", &Params::new()).unwrap());
        assert_eq!(tracks.len(), 1);

        let stream = listing(p.navigate("/stream/", &Params::new()).unwrap());
        assert_eq!(stream.len(), 1);
        assert_eq!(stream[0].target_uri(), "/play/?id=5");
    }

    #[test]
    fn test_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let p = provider(FakeCatalog::default(), dir.path());

        let err = p.navigate("/nowhere/", &Params::new()).unwrap_err();
        assert!(matches!(err, NavError::RouteNotFound(ref path) if path == "/nowhere/"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("explore"), "/explore/");
        assert_eq!(normalize_path("/explore/genre/music"), "/explore/genre/music/");
    }
}
