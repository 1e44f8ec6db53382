//! Navigation URI helpers
//!
//! URIs are `/seg/seg/` paths with an optional `?key=value` query. Query keys
//! are emitted in sorted order so equal parameter sets give equal URIs.

use std::collections::BTreeMap;

/// Query parameters of a navigation request
pub type Params = BTreeMap<String, String>;

/// Name of the pagination parameter
pub const PAGE_PARAM: &str = "page";

/// Build a navigation URI from path segments and query parameters
pub fn create_uri<S: AsRef<str>>(segments: &[S], params: &Params) -> String {
    let joined = segments
        .iter()
        .map(|s| s.as_ref().trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    let mut uri = if joined.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", joined)
    };

    if !params.is_empty() {
        uri.push('?');
        uri.push_str(&encode_query(params));
    }

    uri
}

/// Append `params` to an already formed path
pub fn with_query(path: &str, params: &Params) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    format!("{}?{}", path, encode_query(params))
}

fn encode_query(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Split `path?query` into the path and its decoded parameters
pub fn split_uri(uri: &str) -> (String, Params) {
    match uri.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (uri.to_string(), Params::new()),
    }
}

/// Parse a `k=v&k2=v2` query string. Undecodable pairs are kept verbatim.
pub fn parse_query(query: &str) -> Params {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}

fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    urlencoding::decode(&s)
        .map(|c| c.into_owned())
        .unwrap_or(s)
}

/// Current page number; 1 when absent, unparsable or below 1
pub fn page_param(params: &Params) -> u32 {
    params
        .get(PAGE_PARAM)
        .and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or(1)
}

/// The page after the current one and the URI that replays `path` for it
///
/// `None` when the current page is already the last representable one.
pub fn next_page_uri(path: &str, params: &Params) -> Option<(u32, String)> {
    let next = page_param(params).checked_add(1)?;
    let mut next_params = params.clone();
    next_params.insert(PAGE_PARAM.to_string(), next.to_string());
    Some((next, with_query(path, &next_params)))
}
