//! Inbound request parsing and upstream URL construction.
//!
//! [`RequestContext`] splits the inbound path into
//! `{account, share, container, relative_path}` and carries the raw query
//! string (the SAS token) unchanged.  [`UpstreamUrls`] derives the two
//! candidate upstream targets from it.  Both are immutable per-request
//! values; nothing here performs I/O.

use std::collections::HashMap;

use crate::config::GatewayConfig;
use crate::errors::GatewayError;

/// The three mandatory leading path segments, in order.
const MANDATORY_SEGMENTS: [&str; 3] = ["account", "share", "container"];

/// Parsed form of an inbound request path and query.
///
/// Fully determined by the inbound URL; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Storage account name (first path segment).
    pub account: String,
    /// File share name (second path segment).
    pub share: String,
    /// Blob container name (third path segment).
    pub container: String,
    /// Object path below the container. Empty, or `/`-prefixed.
    pub relative_path: String,
    /// Raw query string including the leading `?`, or empty. Forwarded
    /// byte-for-byte to every upstream call; no re-encoding, no validation.
    pub query: String,
}

impl RequestContext {
    /// Parse an inbound path and optional raw query string.
    ///
    /// Fails with a 400-mapped error naming the missing segment(s) when the
    /// path carries fewer than three non-empty segments.
    pub fn from_parts(path: &str, query: Option<&str>) -> Result<Self, GatewayError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.len() < MANDATORY_SEGMENTS.len() {
            let missing = MANDATORY_SEGMENTS[segments.len()..].join("/");
            return Err(GatewayError::MissingPathSegments {
                missing,
                path: path.to_string(),
            });
        }

        let relative_path = if segments.len() == 3 {
            String::new()
        } else {
            format!("/{}", segments[3..].join("/"))
        };

        let query = match query {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        };

        Ok(Self {
            account: segments[0].to_string(),
            share: segments[1].to_string(),
            container: segments[2].to_string(),
            relative_path,
            query,
        })
    }

    /// Whether any path segments follow the container.
    pub fn has_object_path(&self) -> bool {
        !self.relative_path.is_empty()
    }

    /// Decode the query string into a key/value map.
    ///
    /// Used only to detect management-operation parameters (`comp`,
    /// `restype`); the raw query is what gets forwarded upstream.
    pub fn query_params(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for part in self.query.trim_start_matches('?').split('&') {
            if let Some((k, v)) = part.split_once('=') {
                let decoded_k = percent_encoding::percent_decode_str(k)
                    .decode_utf8_lossy()
                    .into_owned();
                let decoded_v = percent_encoding::percent_decode_str(v)
                    .decode_utf8_lossy()
                    .into_owned();
                map.insert(decoded_k, decoded_v);
            } else if !part.is_empty() {
                // Query params without value (e.g. `?restype`).
                let decoded = percent_encoding::percent_decode_str(part)
                    .decode_utf8_lossy()
                    .into_owned();
                map.insert(decoded, String::new());
            }
        }
        map
    }
}

/// The two candidate upstream targets for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamUrls {
    /// File-share target, SAS included. The safe fallback.
    pub file_url: String,
    /// Blob target without the SAS query. Base for block-list operations.
    pub blob_base_url: String,
    /// Blob target with the SAS query appended. Redirect destination.
    pub blob_url: String,
}

impl UpstreamUrls {
    /// Build both upstream URLs from a parsed context. Pure, infallible.
    pub fn build(ctx: &RequestContext, gateway: &GatewayConfig) -> Self {
        let file_url = format!(
            "{}://{}.{}/{}{}{}",
            gateway.scheme,
            ctx.account,
            gateway.file_endpoint_suffix,
            ctx.share,
            ctx.relative_path,
            ctx.query
        );
        let blob_base_url = format!(
            "{}://{}.{}/{}{}",
            gateway.scheme,
            ctx.account,
            gateway.blob_endpoint_suffix,
            ctx.container,
            ctx.relative_path
        );
        let blob_url = format!("{}{}", blob_base_url, ctx.query);

        Self {
            file_url,
            blob_base_url,
            blob_url,
        }
    }
}

/// Append a raw `?`-prefixed query string onto a URL that may already carry
/// query parameters, switching the joiner to `&` when it does.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    if url.contains('?') {
        format!("{}&{}", url, query.trim_start_matches('?'))
    } else {
        format!("{}{}", url, query)
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_path() {
        let ctx =
            RequestContext::from_parts("/acct/sh/ct/dir/file.bin", Some("sv=2023&sig=x")).unwrap();
        assert_eq!(ctx.account, "acct");
        assert_eq!(ctx.share, "sh");
        assert_eq!(ctx.container, "ct");
        assert_eq!(ctx.relative_path, "/dir/file.bin");
        assert_eq!(ctx.query, "?sv=2023&sig=x");
    }

    #[test]
    fn test_parse_no_object_path() {
        let ctx = RequestContext::from_parts("/acct/sh/ct", None).unwrap();
        assert_eq!(ctx.relative_path, "");
        assert!(!ctx.has_object_path());
        assert_eq!(ctx.query, "");
    }

    #[test]
    fn test_parse_collapses_empty_segments() {
        let ctx = RequestContext::from_parts("//acct//sh/ct///a//b/", None).unwrap();
        assert_eq!(ctx.account, "acct");
        assert_eq!(ctx.relative_path, "/a/b");
    }

    #[test]
    fn test_missing_all_segments() {
        let err = RequestContext::from_parts("/", None).unwrap_err();
        match err {
            GatewayError::MissingPathSegments { missing, path } => {
                assert_eq!(missing, "account/share/container");
                assert_eq!(path, "/");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_share_and_container() {
        let err = RequestContext::from_parts("/acct", None).unwrap_err();
        match err {
            GatewayError::MissingPathSegments { missing, .. } => {
                assert_eq!(missing, "share/container");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_container_only() {
        let err = RequestContext::from_parts("/acct/sh", None).unwrap_err();
        match err {
            GatewayError::MissingPathSegments { missing, path } => {
                assert_eq!(missing, "container");
                assert_eq!(path, "/acct/sh");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_query_variants() {
        let ctx = RequestContext::from_parts("/a/b/c", Some("")).unwrap();
        assert_eq!(ctx.query, "");
        let ctx = RequestContext::from_parts("/a/b/c", None).unwrap();
        assert_eq!(ctx.query, "");
    }

    #[test]
    fn test_query_params_detects_comp_and_restype() {
        let ctx = RequestContext::from_parts("/a/b/c/x", Some("comp=list&sv=1")).unwrap();
        assert!(ctx.query_params().contains_key("comp"));

        // Valueless parameter form.
        let ctx = RequestContext::from_parts("/a/b/c/x", Some("restype")).unwrap();
        assert!(ctx.query_params().contains_key("restype"));

        let ctx = RequestContext::from_parts("/a/b/c/x", Some("sv=1&sig=x")).unwrap();
        let params = ctx.query_params();
        assert!(!params.contains_key("comp"));
        assert!(!params.contains_key("restype"));
    }

    #[test]
    fn test_query_forwarded_verbatim() {
        // Percent-encoded SAS material must not be re-encoded or decoded.
        let raw = "sv=2023-11-03&sig=a%2Bb%3D&se=2026-12-31T00%3A00%3A00Z";
        let ctx = RequestContext::from_parts("/a/b/c/x", Some(raw)).unwrap();
        assert_eq!(ctx.query, format!("?{raw}"));
    }

    #[test]
    fn test_upstream_urls_default_endpoints() {
        let ctx =
            RequestContext::from_parts("/acct/sh/ct/dir/file.bin", Some("sv=abc")).unwrap();
        let urls = UpstreamUrls::build(&ctx, &GatewayConfig::default());
        assert_eq!(
            urls.file_url,
            "https://acct.file.core.windows.net/sh/dir/file.bin?sv=abc"
        );
        assert_eq!(
            urls.blob_base_url,
            "https://acct.blob.core.windows.net/ct/dir/file.bin"
        );
        assert_eq!(
            urls.blob_url,
            "https://acct.blob.core.windows.net/ct/dir/file.bin?sv=abc"
        );
    }

    #[test]
    fn test_upstream_urls_no_object_path_no_query() {
        let ctx = RequestContext::from_parts("/acct/sh/ct", None).unwrap();
        let urls = UpstreamUrls::build(&ctx, &GatewayConfig::default());
        assert_eq!(urls.file_url, "https://acct.file.core.windows.net/sh");
        assert_eq!(urls.blob_url, "https://acct.blob.core.windows.net/ct");
    }

    #[test]
    fn test_upstream_urls_custom_endpoints() {
        let ctx = RequestContext::from_parts("/acct/sh/ct/x", None).unwrap();
        let gateway = GatewayConfig {
            scheme: "http".to_string(),
            file_endpoint_suffix: "file.core.chinacloudapi.cn".to_string(),
            blob_endpoint_suffix: "blob.core.chinacloudapi.cn".to_string(),
            ..GatewayConfig::default()
        };
        let urls = UpstreamUrls::build(&ctx, &gateway);
        assert_eq!(urls.file_url, "http://acct.file.core.chinacloudapi.cn/sh/x");
        assert_eq!(urls.blob_url, "http://acct.blob.core.chinacloudapi.cn/ct/x");
    }

    #[test]
    fn test_append_query() {
        assert_eq!(append_query("https://h/p", "?sv=1"), "https://h/p?sv=1");
        assert_eq!(
            append_query("https://h/p?comp=blocklist", "?sv=1"),
            "https://h/p?comp=blocklist&sv=1"
        );
        assert_eq!(append_query("https://h/p?comp=blocklist", ""), "https://h/p?comp=blocklist");
    }
}
