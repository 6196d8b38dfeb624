//! Conditional request headers.
//!
//! A request carrying the validators of the last full response lets the
//! server answer `304 Not Modified` instead of resending an unchanged body.

use dexsync_store::Validators;

pub const ACCEPT: &str = "Accept";
pub const IF_NONE_MATCH: &str = "If-None-Match";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";

/// Build the header list for one request.
///
/// `Accept` is always present. `If-None-Match` is added for a stored etag and
/// `If-Modified-Since` for a stored modification token; empty tokens count as
/// absent. Without validators the request is unconditional.
///
/// # Examples
///
/// ```
/// use dexsync_fetch::{Validators, conditional_headers};
///
/// let stored = Validators::new("https://x/a.json").with_etag("v1");
/// let headers = conditional_headers("application/json", Some(&stored));
/// assert_eq!(headers[1], ("If-None-Match".to_string(), "v1".to_string()));
/// ```
pub fn conditional_headers(accept: &str, validators: Option<&Validators>) -> Vec<(String, String)> {
    let mut headers = vec![(ACCEPT.to_string(), accept.to_string())];

    let Some(validators) = validators else {
        return headers;
    };

    if let Some(etag) = validators.etag.as_deref().filter(|t| !t.is_empty()) {
        headers.push((IF_NONE_MATCH.to_string(), etag.to_string()));
    }
    if let Some(since) = validators.last_modified.as_deref().filter(|t| !t.is_empty()) {
        headers.push((IF_MODIFIED_SINCE.to_string(), since.to_string()));
    }

    headers
}
