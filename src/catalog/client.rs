//! SoundCloud API Client
//!
//! Thin HTTP access to the public and mobile SoundCloud APIs. Every call
//! returns the raw JSON payload; interpretation is left to the transformer.
//! Handlers are synchronous, so each request is driven to completion on
//! the runtime handle the client was built with.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::errors::CatalogError;
use crate::config::Settings;

/// Maximum number of retries for retryable errors
const MAX_RETRIES: u32 = 3;

/// Default category for trending listings
const DEFAULT_TRENDING_CATEGORY: &str = "music";

/// Remote catalog operations used by the navigation handlers
pub trait Catalog {
    /// Trending tracks of a category (mobile payload)
    fn trending(&self, category: Option<&str>, page: u32) -> Result<Value, CatalogError>;

    /// Tracks of a genre (mobile payload)
    fn genre(&self, genre: &str, page: u32) -> Result<Value, CatalogError>;

    /// Genre taxonomy: `{<category>: [{title}, ...]}`
    fn categories(&self) -> Result<Value, CatalogError>;

    /// Full-text search over tracks, users and playlists (api payload)
    fn search(&self, query: &str, page: u32) -> Result<Value, CatalogError>;

    /// Playback location of a track: `{location}`
    fn track_url(&self, track_id: &str) -> Result<Value, CatalogError>;

    /// Playlists of a user (`me` for the signed-in user)
    fn playlists(&self, user_id: &str) -> Result<Value, CatalogError>;

    /// A playlist including its tracks
    fn playlist(&self, playlist_id: &str) -> Result<Value, CatalogError>;

    /// Tracks uploaded by a user (api payload)
    fn user_tracks(&self, user_id: &str, page: u32) -> Result<Value, CatalogError>;

    /// Activity stream of the signed-in user
    fn stream(&self) -> Result<Value, CatalogError>;

    /// Whether requests carry a user access token
    fn is_signed_in(&self) -> bool;
}

/// SoundCloud client for making API requests
#[derive(Clone)]
pub struct SoundCloudClient {
    http_client: Client,
    runtime: Handle,
    api_url: String,
    mobile_api_url: String,
    client_id: String,
    access_token: Option<String>,
    page_size: u32,
}

impl SoundCloudClient {
    /// Create a client from settings, running requests on `runtime`
    pub fn new(settings: &Settings, runtime: Handle) -> Result<Self, CatalogError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| CatalogError::Request(format!("Failed to create HTTP client: {}", e)))?;

        let access_token = settings
            .access_token
            .clone()
            .filter(|token| !token.is_empty());

        info!(
            api_url = %settings.api_url,
            signed_in = access_token.is_some(),
            "SoundCloud client ready"
        );

        Ok(Self {
            http_client,
            runtime,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            mobile_api_url: settings.mobile_api_url.trim_end_matches('/').to_string(),
            client_id: settings.client_id.clone(),
            access_token,
            page_size: settings.page_size,
        })
    }

    fn offset(&self, page: u32) -> u64 {
        u64::from(page.saturating_sub(1)) * u64::from(self.page_size)
    }

    fn paging(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("limit", self.page_size.to_string()),
            ("offset", self.offset(page).to_string()),
            ("linked_partitioning", "1".to_string()),
        ]
    }

    /// Build a request URL with credentials and extra query parameters
    fn url(&self, base: &str, path: &str, query: &[(&str, String)]) -> String {
        let mut pairs = vec![format!("client_id={}", urlencoding::encode(&self.client_id))];
        if let Some(token) = &self.access_token {
            pairs.push(format!("oauth_token={}", urlencoding::encode(token)));
        }
        pairs.extend(
            query
                .iter()
                .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v))),
        );
        format!("{}{}?{}", base, path, pairs.join("&"))
    }

    /// GET a JSON document
    async fn get_json(&self, url: &str) -> Result<Value, CatalogError> {
        debug!(url = %redact(url), "GET");

        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::from_status(status, &body));
        }

        Ok(response.json::<Value>().await?)
    }

    /// Execute an operation with retry logic and exponential backoff
    async fn with_retry<F, Fut, T>(&self, operation: &str, f: F) -> Result<T, CatalogError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let backoff_ms = [500u64, 1000, 2000];
        let mut attempt = 0;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let delay = backoff_ms.get(attempt as usize).copied().unwrap_or(2000);
                    warn!(
                        operation = operation,
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        delay_ms = delay,
                        error = %e,
                        "Retrying SoundCloud request"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch `url` with retries, blocking the calling thread
    fn fetch(&self, operation: &str, url: String) -> Result<Value, CatalogError> {
        self.runtime
            .block_on(self.with_retry(operation, || self.get_json(&url)))
    }
}

impl Catalog for SoundCloudClient {
    fn trending(&self, category: Option<&str>, page: u32) -> Result<Value, CatalogError> {
        let category = category.unwrap_or(DEFAULT_TRENDING_CATEGORY);
        let path = format!(
            "/app/mobileapps/suggestions/tracks/popular/{}",
            urlencoding::encode(category)
        );
        let url = self.url(&self.mobile_api_url, &path, &self.paging(page));
        self.fetch("trending", url)
    }

    fn genre(&self, genre: &str, page: u32) -> Result<Value, CatalogError> {
        let path = format!(
            "/app/mobileapps/suggestions/tracks/categories/{}",
            urlencoding::encode(genre)
        );
        let url = self.url(&self.mobile_api_url, &path, &self.paging(page));
        self.fetch("genre", url)
    }

    fn categories(&self) -> Result<Value, CatalogError> {
        let url = self.url(
            &self.mobile_api_url,
            "/app/mobileapps/suggestions/tracks/categories",
            &[],
        );
        self.fetch("categories", url)
    }

    fn search(&self, query: &str, page: u32) -> Result<Value, CatalogError> {
        let mut params = self.paging(page);
        params.push(("q", query.to_string()));
        let url = self.url(&self.api_url, "/search", &params);
        self.fetch("search", url)
    }

    fn track_url(&self, track_id: &str) -> Result<Value, CatalogError> {
        // Ask for the redirect target as a JSON body instead of a 302
        let path = format!("/tracks/{}/stream", urlencoding::encode(track_id));
        let url = self.url(
            &self.api_url,
            &path,
            &[("_status_code_map[302]", "200".to_string())],
        );
        self.fetch("track_url", url)
    }

    fn playlists(&self, user_id: &str) -> Result<Value, CatalogError> {
        let path = if user_id == "me" {
            "/me/playlists".to_string()
        } else {
            format!("/users/{}/playlists", urlencoding::encode(user_id))
        };
        let url = self.url(&self.api_url, &path, &[]);
        self.fetch("playlists", url)
    }

    fn playlist(&self, playlist_id: &str) -> Result<Value, CatalogError> {
        let path = format!("/playlists/{}", urlencoding::encode(playlist_id));
        let url = self.url(&self.api_url, &path, &[]);
        self.fetch("playlist", url)
    }

    fn user_tracks(&self, user_id: &str, page: u32) -> Result<Value, CatalogError> {
        let path = format!("/users/{}/tracks", urlencoding::encode(user_id));
        let url = self.url(&self.api_url, &path, &self.paging(page));
        self.fetch("user_tracks", url)
    }

    fn stream(&self) -> Result<Value, CatalogError> {
        if !self.is_signed_in() {
            return Err(CatalogError::Unauthorized);
        }
        let url = self.url(
            &self.api_url,
            "/e1/me/stream",
            &[("limit", self.page_size.to_string())],
        );
        self.fetch("stream", url)
    }

    fn is_signed_in(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Strip credentials from a URL before logging it
fn redact(url: &str) -> String {
    url.split('&')
        .map(|pair| {
            if pair.contains("oauth_token=") {
                "oauth_token=***"
            } else {
                pair
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client(token: Option<&str>) -> (tokio::runtime::Runtime, SoundCloudClient) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let settings = Settings {
            client_id: "abc".to_string(),
            access_token: token.map(String::from),
            ..Settings::default()
        };
        let client = SoundCloudClient::new(&settings, runtime.handle().clone()).unwrap();
        (runtime, client)
    }

    #[test]
    fn test_url_building() {
        let (_rt, client) = make_client(None);
        let url = client.url("https://api.soundcloud.com", "/search", &client.paging(3));
        assert_eq!(
            url,
            "https://api.soundcloud.com/search?client_id=abc&limit=50&offset=100&linked_partitioning=1"
        );
        assert!(!client.is_signed_in());
    }

    #[test]
    fn test_offset_of_huge_page() {
        let (_rt, client) = make_client(None);
        assert_eq!(client.offset(1), 0);
        assert_eq!(client.offset(100_000_000), 4_999_999_950);
        assert_eq!(client.offset(u32::MAX), (u64::from(u32::MAX) - 1) * 50);

        let url = client.url("https://api.soundcloud.com", "/search", &client.paging(100_000_000));
        assert!(url.contains("offset=4999999950"));
    }

    #[test]
    fn test_signed_in_and_redaction() {
        let (_rt, client) = make_client(Some("secret"));
        assert!(client.is_signed_in());

        let url = client.url("https://api.soundcloud.com", "/me/playlists", &[]);
        assert!(url.contains("oauth_token=secret"));
        assert!(!redact(&url).contains("secret"));

        let (_rt, anonymous) = make_client(Some(""));
        assert!(!anonymous.is_signed_in());
    }

    #[test]
    fn test_stream_requires_sign_in() {
        let (_rt, client) = make_client(None);
        assert!(matches!(client.stream(), Err(CatalogError::Unauthorized)));
    }
}
