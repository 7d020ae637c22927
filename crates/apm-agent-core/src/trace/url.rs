// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::EXTERNAL_HOST_UNKNOWN;
use url::{ParseError, Url};

/// Renders `url` without user info, query string or fragment.
pub fn safe_url(url: &Url) -> String {
    let mut clean = url.clone();
    // Fails only for URLs that cannot carry credentials in the first place.
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean.set_query(None);
    clean.set_fragment(None);
    clean.into()
}

/// Like [`safe_url`] for a raw string. Relative references keep their path;
/// unparseable input yields `""`.
pub fn safe_url_from_str(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match Url::parse(raw) {
        Ok(url) => safe_url(&url),
        Err(ParseError::RelativeUrlWithoutBase) => safe_relative_url(raw),
        Err(_) => String::new(),
    }
}

fn safe_relative_url(raw: &str) -> String {
    // Network-path references (`//host/path`) may carry user info.
    if let Some(authority) = raw.strip_prefix("//") {
        return Url::parse(&format!("http://{authority}"))
            .map(|url| safe_url(&url).trim_start_matches("http:").to_string())
            .unwrap_or_default();
    }
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    raw[..end].to_string()
}

/// `host[:port]` of an external call, used in metric-style segment names.
pub(crate) fn external_host(url: Option<&Url>) -> String {
    match url.and_then(|u| u.host_str().map(|host| (host, u.port()))) {
        Some((host, Some(port))) => format!("{host}:{port}"),
        Some((host, None)) => host.to_string(),
        None => EXTERNAL_HOST_UNKNOWN.to_string(),
    }
}
