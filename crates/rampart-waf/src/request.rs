//! Abstract inbound-request record and location text extraction

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::matcher::truncate_chars;
use crate::types::ScanLocation;

/// Extracted location text is capped to this many characters before any
/// matching, bounding per-request inspection cost regardless of payload size.
pub(crate) const MAX_SCAN_CHARS: usize = 10_000;

/// Framework-agnostic view of one inbound request.
///
/// The hosting web framework adapts its own request object into this record
/// before invoking the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectedRequest {
    pub method: String,
    pub path: String,
    pub original_url: String,
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(default)]
    pub query: serde_json::Value,
    /// Header names are expected lowercased; lookups fall back to a
    /// case-insensitive scan for adapters that do not normalize.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub cookies: HashMap<String, String>,
    /// Transport-level peer address, the fallback when no forwarded header
    /// is present
    pub peer_addr: String,
}

impl InspectedRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method: method.into(),
            original_url: path.clone(),
            path,
            body: serde_json::Value::Null,
            query: serde_json::Value::Null,
            headers: HashMap::new(),
            cookies: HashMap::new(),
            peer_addr: String::new(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, query: serde_json::Value) -> Self {
        self.query = query;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_peer_addr(mut self, addr: &str) -> Self {
        self.peer_addr = addr.to_string();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(v) = self.headers.get(name) {
            return Some(v.as_str());
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Resolve the client address: left-most entry of `x-forwarded-for`
    /// wins, falling back to the transport peer address.
    pub fn client_addr(&self) -> String {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        self.peer_addr.clone()
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    /// Country tag supplied by an upstream geo-resolving proxy, if any
    pub fn country(&self) -> Option<&str> {
        self.header("cf-ipcountry").or_else(|| self.header("x-country-code"))
    }

    /// Canonical text for one scan location, capped to [`MAX_SCAN_CHARS`].
    pub fn location_text(&self, location: ScanLocation) -> String {
        let text = match location {
            ScanLocation::Body => stable_json(&self.body),
            ScanLocation::Query => stable_json(&self.query),
            ScanLocation::Headers => {
                let mut lines: Vec<String> = self
                    .headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                lines.sort();
                lines.join("\n")
            }
            ScanLocation::Path => {
                format!("{} {}", url_decode(&self.path), self.original_url)
            }
        };
        truncate_chars(&text, MAX_SCAN_CHARS).to_string()
    }
}

/// Stable serialized form of a structured value. Null serializes to the
/// empty string so absent bodies do not feed `"null"` into the matchers.
fn stable_json(value: &serde_json::Value) -> String {
    if value.is_null() {
        return String::new();
    }
    serde_json::to_string(value).unwrap_or_default()
}

/// Percent-decode a path. Invalid escapes pass through unchanged.
pub(crate) fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut result = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) =
                u8::from_str_radix(std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""), 16)
            {
                result.push(hex as char);
                i += 3;
                continue;
            }
        }
        result.push(bytes[i] as char);
        i += 1;
    }
    result
}
