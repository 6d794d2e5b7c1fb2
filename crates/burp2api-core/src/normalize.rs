//! Traffic normalization.
//!
//! Turns the raw records of a Burp export into an ordered, deduplicated list
//! of endpoint observations that the OpenAPI mapper can consume:
//!
//! 1. records without a method, URL or path are rejected,
//! 2. methods outside [`METHOD_PRIORITY`] (OPTIONS, HEAD, ...) are dropped and
//!    the rest are stable-sorted by priority,
//! 3. the first record per `(url, method, path)` wins, root-path (`/`)
//!    records are skipped,
//! 4. the request is decoded and its `Connection: close` header removed,
//! 5. the parameter string is lifted out of the query or the request body.
//!
//! Auxiliary export fields ([`STRIPPED_FIELDS`]) have no counterpart on
//! [`NormalizedRecord`].

// Internal imports (std, crate)
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

use crate::burp::{EncodedText, RawRecord};
use crate::Error;

// External imports (alphabetized)
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

/// Methods kept by the normalizer, in output order.
pub const METHOD_PRIORITY: [Method; 5] = [
    Method::Get,
    Method::Post,
    Method::Delete,
    Method::Put,
    Method::Patch,
];

/// Export fields that carry no endpoint information and are not carried over.
pub const STRIPPED_FIELDS: [&str; 8] = [
    "host",
    "port",
    "protocol",
    "extension",
    "responselength",
    "response",
    "comment",
    "time",
];

/// The header line and any whitespace-only lines after it.
static CONNECTION_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Connection: close.*?\n\s*").expect("valid regex"));

/// Accepts missing padding and trailing bits; Burp payloads are sometimes truncated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// HTTP methods that survive normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
    Put,
    Patch,
}

impl Method {
    /// Parse an exported method token. Tokens are matched exactly, as Burp records them.
    pub fn from_token(token: &str) -> Option<Self> {
        METHOD_PRIORITY
            .iter()
            .copied()
            .find(|method| method.as_str() == token)
    }

    /// Position in [`METHOD_PRIORITY`]; lower sorts first.
    pub fn priority(self) -> usize {
        METHOD_PRIORITY
            .iter()
            .position(|method| *method == self)
            .unwrap_or(METHOD_PRIORITY.len())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cleaned endpoint observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub url: String,
    pub method: Method,
    /// Path with any query string removed
    pub path: String,
    pub status: Option<String>,
    /// Decoded request without its `Connection: close` header
    pub request_text: String,
    /// Query string, or the last request line for non-GET requests
    pub param: Option<String>,
    pub mimetype: Option<String>,
}

struct Candidate<'a> {
    record: &'a RawRecord,
    url: &'a str,
    method: Method,
    path: &'a str,
}

/// Normalize raw export records.
///
/// Fails only when a record lacks its method, URL or path. Undecodable
/// request payloads are recovered with lossy decoding.
pub fn normalize(records: &[RawRecord]) -> crate::Result<Vec<NormalizedRecord>> {
    let mut candidates = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let method = record
            .method
            .as_deref()
            .ok_or_else(|| Error::missing_field(index, "method"))?;
        let url = record
            .url
            .as_deref()
            .ok_or_else(|| Error::missing_field(index, "url"))?;
        let path = record
            .path
            .as_deref()
            .ok_or_else(|| Error::missing_field(index, "path"))?;

        match Method::from_token(method) {
            Some(method) => candidates.push(Candidate {
                record,
                url,
                method,
                path,
            }),
            None => log::debug!("Skipping {} {} (unsupported method)", method, url),
        }
    }

    // Stable: records with equal priority keep their export order.
    candidates.sort_by_key(|c| c.method.priority());

    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for candidate in candidates {
        if candidate.path == "/" {
            log::debug!("Skipping {} {} (root path)", candidate.method, candidate.url);
            continue;
        }
        if !seen.insert((candidate.url, candidate.method, candidate.path)) {
            continue;
        }
        normalized.push(normalize_record(&candidate));
    }

    log::info!(
        "Normalized {} of {} records",
        normalized.len(),
        records.len()
    );
    Ok(normalized)
}

fn normalize_record(candidate: &Candidate<'_>) -> NormalizedRecord {
    let record = candidate.record;
    let request_text = record
        .request
        .as_ref()
        .map(|request| strip_connection_close(&decode_request(request)).into_owned());

    let (path, param) = match candidate.path.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None if candidate.method != Method::Get => {
            (candidate.path, request_text.as_deref().map(last_line))
        }
        None => (candidate.path, None),
    };

    NormalizedRecord {
        url: candidate.url.to_string(),
        method: candidate.method,
        path: path.to_string(),
        status: record.status.clone(),
        request_text: request_text.unwrap_or_default(),
        param,
        mimetype: record.mimetype.clone(),
    }
}

/// Decode a request payload, never failing.
///
/// Characters outside the base64 alphabet are ignored, and invalid UTF-8 is
/// replaced with U+FFFD.
pub fn decode_request(encoded: &EncodedText) -> String {
    if !encoded.is_base64() {
        return encoded.text.clone();
    }

    let mut cleaned: String = encoded
        .text
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '/')
        .collect();
    let garbage = encoded
        .text
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=') || c.is_whitespace()))
        .count();
    // A lone trailing sextet cannot encode a byte.
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }
    if garbage > 0 {
        log::warn!("Ignored {} invalid base64 characters in request", garbage);
    }

    match LENIENT_BASE64.decode(cleaned.as_bytes()) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            if let Cow::Owned(_) = text {
                log::warn!("Request contained invalid UTF-8; replaced undecodable bytes");
            }
            text.into_owned()
        }
        Err(e) => {
            log::warn!("Could not decode request payload: {}", e);
            String::new()
        }
    }
}

/// Remove the first `Connection: close` header and the blank lines that follow it.
pub fn strip_connection_close(request: &str) -> Cow<'_, str> {
    CONNECTION_CLOSE.replacen(request, 1, "")
}

/// Last `\n`-separated line; POST-style bodies are expected to sit there.
fn last_line(text: &str) -> String {
    text.rsplit('\n').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn raw(method: &str, url: &str, path: &str, request: &str) -> RawRecord {
        RawRecord {
            url: Some(url.to_string()),
            method: Some(method.to_string()),
            path: Some(path.to_string()),
            request: Some(EncodedText {
                base64: Some("true".to_string()),
                text: STANDARD.encode(request),
            }),
            status: Some("200".to_string()),
            host: Some(crate::burp::Host {
                ip: Some("10.0.0.1".to_string()),
                name: "api.example.com".to_string(),
            }),
            port: Some("443".to_string()),
            comment: Some("note".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_query_becomes_param() -> crate::Result<()> {
        let records = vec![raw(
            "GET",
            "http://api.example.com/users",
            "/users?id=5",
            "GET /users?id=5 HTTP/1.1\r\nHost: api.example.com\r\n\r\n",
        )];
        let normalized = normalize(&records)?;
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].path, "/users");
        assert_eq!(normalized[0].param.as_deref(), Some("id=5"));
        assert_eq!(normalized[0].status.as_deref(), Some("200"));
        Ok(())
    }

    #[test]
    fn test_options_and_unknown_methods_excluded() -> crate::Result<()> {
        let records = vec![
            raw("OPTIONS", "http://x.com/a", "/a", ""),
            raw("HEAD", "http://x.com/a", "/a", ""),
            raw("GET", "http://x.com/a", "/a", ""),
        ];
        let normalized = normalize(&records)?;
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].method, Method::Get);
        Ok(())
    }

    #[test]
    fn test_root_path_excluded() -> crate::Result<()> {
        let records = vec![
            raw("GET", "http://x.com/", "/", ""),
            raw("POST", "http://x.com/", "/", "a=b"),
        ];
        assert!(normalize(&records)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_root_with_query_is_not_root() -> crate::Result<()> {
        let records = vec![raw("GET", "http://x.com/?q=1", "/?q=1", "")];
        let normalized = normalize(&records)?;
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].path, "/");
        Ok(())
    }

    #[test]
    fn test_priority_ordering_is_stable() -> crate::Result<()> {
        let records = vec![
            raw("PATCH", "http://x.com/p", "/p", "{}"),
            raw("PUT", "http://x.com/u", "/u", "{}"),
            raw("DELETE", "http://x.com/d", "/d", ""),
            raw("GET", "http://x.com/g2", "/g2", ""),
            raw("POST", "http://x.com/o", "/o", "a=1"),
            raw("GET", "http://x.com/g1", "/g1", ""),
        ];
        let normalized = normalize(&records)?;
        let order: Vec<_> = normalized
            .iter()
            .map(|r| (r.method, r.path.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Method::Get, "/g2"),
                (Method::Get, "/g1"),
                (Method::Post, "/o"),
                (Method::Delete, "/d"),
                (Method::Put, "/u"),
                (Method::Patch, "/p"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_duplicates_first_wins() -> crate::Result<()> {
        let mut second = raw("GET", "http://x.com/a", "/a", "");
        second.status = Some("500".to_string());
        let records = vec![raw("GET", "http://x.com/a", "/a", ""), second];
        let normalized = normalize(&records)?;
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].status.as_deref(), Some("200"));
        Ok(())
    }

    #[test]
    fn test_dedup_key_uses_raw_path() -> crate::Result<()> {
        let records = vec![
            raw("GET", "http://x.com/a?x=1", "/a?x=1", ""),
            raw("GET", "http://x.com/a?y=2", "/a?y=2", ""),
            raw("POST", "http://x.com/a?x=1", "/a?x=1", ""),
        ];
        let normalized = normalize(&records)?;
        assert_eq!(normalized.len(), 3);
        assert!(normalized.iter().all(|r| r.path == "/a"));

        let mut keys = HashSet::new();
        for r in &normalized {
            assert!(keys.insert((r.url.clone(), r.method, r.param.clone())));
        }
        Ok(())
    }

    #[test]
    fn test_post_param_from_last_line() -> crate::Result<()> {
        let request = "POST /login HTTP/1.1\r\nHost: x.com\r\nConnection: close\r\n\r\nuser=a&pass=b";
        let normalized = normalize(&[raw("POST", "http://x.com/login", "/login", request)])?;
        assert_eq!(normalized[0].param.as_deref(), Some("user=a&pass=b"));
        assert_eq!(
            normalized[0].request_text,
            "POST /login HTTP/1.1\r\nHost: x.com\r\nuser=a&pass=b"
        );
        Ok(())
    }

    #[test]
    fn test_non_get_query_wins_over_body() -> crate::Result<()> {
        let request = "PUT /items?debug=1 HTTP/1.1\r\n\r\n{\"name\":\"a\"}";
        let normalized = normalize(&[raw("PUT", "http://x.com/items", "/items?debug=1", request)])?;
        assert_eq!(normalized[0].path, "/items");
        assert_eq!(normalized[0].param.as_deref(), Some("debug=1"));
        Ok(())
    }

    #[test]
    fn test_get_without_query_has_no_param() -> crate::Result<()> {
        let normalized = normalize(&[raw("GET", "http://x.com/a", "/a", "GET /a HTTP/1.1\r\n\r\n")])?;
        assert_eq!(normalized[0].param, None);
        Ok(())
    }

    #[test]
    fn test_missing_method_is_fatal() {
        let mut record = raw("GET", "http://x.com/a", "/a", "");
        record.method = None;
        let records = vec![raw("GET", "http://x.com/b", "/b", ""), record];
        match normalize(&records) {
            Err(Error::MissingField { index, field }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "method");
            }
            other => panic!("expected missing field error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_path_is_fatal() {
        let mut record = raw("OPTIONS", "http://x.com/a", "/a", "");
        record.path = None;
        assert!(matches!(
            normalize(&[record]),
            Err(Error::MissingField { field: "path", .. })
        ));
    }

    #[test]
    fn test_strip_connection_close_first_match_only() {
        let request = "GET / HTTP/1.1\r\nConnection: close\r\n  \r\n\r\nBody\r\nConnection: close\r\nEnd";
        assert_eq!(
            strip_connection_close(request),
            "GET / HTTP/1.1\r\nBody\r\nConnection: close\r\nEnd"
        );
        assert_eq!(strip_connection_close("no header"), "no header");
    }

    #[test]
    fn test_decode_request_lenient() {
        let valid = STANDARD.encode("GET /a HTTP/1.1");
        let noisy = EncodedText {
            base64: None,
            text: format!("  {}\n", valid.trim_end_matches('=')),
        };
        assert_eq!(decode_request(&noisy), "GET /a HTTP/1.1");

        let garbage = EncodedText {
            base64: Some("true".into()),
            text: "!!!".into(),
        };
        assert_eq!(decode_request(&garbage), "");

        let invalid_utf8 = EncodedText {
            base64: Some("true".into()),
            text: STANDARD.encode([0x61u8, 0xff, 0x62]),
        };
        assert_eq!(decode_request(&invalid_utf8), "a\u{fffd}b");
    }

    #[test]
    fn test_decode_request_recovers_damaged_payload() {
        let encoded = |text: &str| EncodedText {
            base64: Some("true".into()),
            text: text.into(),
        };
        // dangling final character
        assert_eq!(decode_request(&encoded("R0VUIC9hX")), "GET /a");
        // noise inside an otherwise valid payload
        assert_eq!(decode_request(&encoded("R0VU!!IC9h")), "GET /a");
        assert_eq!(decode_request(&encoded("R0V=UIC9h")), "GET /a");
        assert_eq!(decode_request(&encoded("-_R0VUIC9h")), "GET /a");
    }

    #[test]
    fn test_sort_follows_priority_constant() -> crate::Result<()> {
        let records: Vec<_> = METHOD_PRIORITY
            .iter()
            .rev()
            .map(|m| raw(m.as_str(), "http://x.com/a", "/a", ""))
            .collect();
        let methods: Vec<_> = normalize(&records)?.iter().map(|r| r.method).collect();
        assert_eq!(methods, METHOD_PRIORITY.to_vec());
        Ok(())
    }

    #[test]
    fn test_plain_request_passes_through() {
        let plain = EncodedText {
            base64: Some("false".into()),
            text: "DELETE /a HTTP/1.1".into(),
        };
        assert_eq!(decode_request(&plain), "DELETE /a HTTP/1.1");
    }

    #[test]
    fn test_method_priority_table() {
        for (index, method) in METHOD_PRIORITY.iter().enumerate() {
            assert_eq!(method.priority(), index);
            assert_eq!(Method::from_token(method.as_str()), Some(*method));
        }
        assert_eq!(Method::from_token("OPTIONS"), None);
        assert_eq!(Method::from_token("get"), None);
    }
}
