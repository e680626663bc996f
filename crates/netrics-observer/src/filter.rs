//! Noise filter deciding which requests appear in a manifest.
//!
//! Evaluated exactly once per request, when it starts.

use url::Url;

/// Image requests with more query parameters than this look like beacons.
pub const MAX_IMAGE_QUERY_PARAMS: usize = 3;

/// Image requests with a longer raw query than this look like beacons.
pub const MAX_IMAGE_QUERY_LEN: usize = 100;

/// Decide whether a request is content worth keeping.
///
/// Rejects non-GET requests, inline `data:` URLs, and image requests whose
/// query string is long or parameter-heavy (tracking pixels).
pub fn should_keep(method: &str, url: &str, resource_type: &str) -> bool {
    if !method.eq_ignore_ascii_case("GET") {
        return false;
    }
    if is_data_url(url) {
        return false;
    }
    if resource_type.eq_ignore_ascii_case("Image") && is_beacon_like(url) {
        return false;
    }
    true
}

fn is_data_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "data",
        Err(_) => url
            .trim_start()
            .get(..5)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")),
    }
}

/// Whether the URL's query is parameter-heavy or long.
fn is_beacon_like(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.query().is_some_and(query_is_noisy),
        Err(_) => split_query(url).is_some_and(query_is_noisy),
    }
}

fn query_is_noisy(query: &str) -> bool {
    let params = query.split('&').filter(|p| !p.is_empty()).count();
    params > MAX_IMAGE_QUERY_PARAMS || query.len() > MAX_IMAGE_QUERY_LEN
}

/// Query of a URL `url::Url` rejects, without the `?` or any fragment.
fn split_query(url: &str) -> Option<&str> {
    let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    without_fragment.split_once('?').map(|(_, query)| query)
}
