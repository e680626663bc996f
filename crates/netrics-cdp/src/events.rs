//! Decoding of CDP protocol events into [`NetworkEvent`]s.
//!
//! Only four events matter to the observer:
//! `Network.requestWillBeSent`, `Network.loadingFinished`,
//! `Network.loadingFailed` and `Page.lifecycleEvent`.

use std::collections::BTreeMap;

use netrics_observer::NetworkEvent;
use serde_json::Value;
use tracing::trace;

/// Decode one protocol event. Returns `None` for events the observer does
/// not use and for request events missing required fields.
pub fn decode_event(method: &str, params: &Value) -> Option<NetworkEvent> {
    match method {
        "Network.requestWillBeSent" => decode_request(params),
        "Network.loadingFinished" => Some(NetworkEvent::RequestFinished {
            id: request_id(params)?,
            encoded_size: encoded_size(&params["encodedDataLength"]),
        }),
        "Network.loadingFailed" => Some(NetworkEvent::RequestFailed {
            id: request_id(params)?,
        }),
        "Page.lifecycleEvent" => Some(NetworkEvent::Lifecycle {
            name: params["name"].as_str()?.to_string(),
        }),
        _ => None,
    }
}

fn decode_request(params: &Value) -> Option<NetworkEvent> {
    let id = request_id(params)?;
    let request = &params["request"];
    let (Some(url), Some(method)) = (request["url"].as_str(), request["method"].as_str()) else {
        trace!(id = %id, "request without url or method dropped");
        return None;
    };
    if url.is_empty() || method.is_empty() {
        trace!(id = %id, "request with empty url or method dropped");
        return None;
    }

    // Non-string header values cannot be replayed and are skipped.
    let headers: BTreeMap<String, String> = request["headers"]
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Some(NetworkEvent::RequestStarted {
        id,
        url: url.to_string(),
        method: method.to_string(),
        headers,
        post_data: request["postData"].as_str().map(String::from),
        resource_type: params["type"].as_str().unwrap_or("Other").to_string(),
    })
}

fn request_id(params: &Value) -> Option<String> {
    params["requestId"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(String::from)
}

/// CDP reports sizes as doubles.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encoded_size(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|n| n.max(0.0) as u64))
        .unwrap_or(0)
}
