//! Reconstruct a request as an equivalent `curl` command line.

use std::collections::BTreeMap;

use url::Url;

/// Build `curl -X '<method>' [-d '<body>'] [-H '<Name: value>']... '<url>'`.
///
/// Header names are canonicalized (`user-agent` → `User-Agent`) and sorted.
/// Returns `None` when the request cannot be reconstructed: a method that is
/// not an HTTP token or a URL that does not parse.
pub fn to_curl(
    method: &str,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: Option<&str>,
) -> Option<String> {
    if !is_token(method) {
        return None;
    }
    let url = Url::parse(url).ok()?;

    let mut parts = vec!["curl".to_string(), "-X".into(), quote(method)];
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        parts.push("-d".into());
        parts.push(quote(body));
    }

    let mut canonical: Vec<(String, &str)> = headers
        .iter()
        .map(|(name, value)| (canonical_header(name), value.as_str()))
        .collect();
    canonical.sort();
    for (name, value) in canonical {
        parts.push("-H".into());
        parts.push(quote(&format!("{name}: {value}")));
    }

    parts.push(quote(url.as_str()));
    Some(parts.join(" "))
}

/// Single-quote for a POSIX shell.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// MIME-style header casing; names that are not tokens are left alone.
fn canonical_header(name: &str) -> String {
    if !is_token(name) {
        return name.to_string();
    }
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}
