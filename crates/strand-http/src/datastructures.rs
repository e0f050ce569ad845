//! Value types parsed from raw request data.
//!
//! All of these are views over the immutable scope: computing them is pure,
//! so the [`Request`](crate::request::Request) caches each one on first
//! access without invalidation logic.

use percent_encoding::percent_decode_str;
use strand_core::Scope;

/// Ordered multimap of header name/value pairs.
///
/// Names are lower-cased on insert. Insertion order among same-name entries
/// is preserved; single-value reads are last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw wire pairs, lower-casing names and keeping order.
    #[must_use]
    pub fn from_raw(raw: &[(String, String)]) -> Self {
        let entries = raw
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();
        Self { entries }
    }

    /// Get a single value by name (case-insensitive, last-write-wins).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a name, in insertion order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Whether any entry has the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Append a value, preserving existing entries with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .push((name.into().to_ascii_lowercase(), value.into()));
    }

    /// Replace all entries with the given name by a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        self.entries.retain(|(k, _)| *k != name);
        self.entries.push((name, value.into()));
    }

    /// Remove all entries with the given name.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Number of entries (counting repeats).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize back to raw pairs for the start frame.
    #[must_use]
    pub fn to_raw(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }
}

/// Query parameters parsed once from the raw query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a raw query string (`a=1&b=2`, percent-encoded).
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let pairs = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        Self { pairs }
    }

    /// Build from already-decoded pairs.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Get a single value by name (last-write-wins).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get all values for a name, in order of appearance.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Cookies parsed from the request's `Cookie` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    pairs: Vec<(String, String)>,
}

impl Cookies {
    /// Parse all `Cookie` headers (`name=value` pairs separated by `;`).
    #[must_use]
    pub fn parse(headers: &Headers) -> Self {
        let mut pairs = Vec::new();
        for header in headers.get_all("cookie") {
            for part in header.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                if let Some((name, value)) = part.split_once('=') {
                    pairs.push((name.trim().to_owned(), value.trim().to_owned()));
                }
            }
        }
        Self { pairs }
    }

    /// Get a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no cookies were sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The request URL assembled from scope attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    full: String,
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
}

impl Url {
    /// Assemble the URL from transport metadata and the raw request path.
    #[must_use]
    pub fn from_scope(scope: &Scope) -> Self {
        let path = percent_decode_str(&scope.raw_path)
            .decode_utf8_lossy()
            .into_owned();
        let query = if scope.query_string.is_empty() {
            None
        } else {
            Some(scope.query_string.clone())
        };

        let mut full = String::new();
        let (host, port) = match &scope.server {
            Some(address) => {
                full.push_str(&scope.scheme);
                full.push_str("://");
                full.push_str(&address.host);
                if let Some(port) = address.port {
                    full.push(':');
                    full.push_str(&port.to_string());
                }
                (Some(address.host.clone()), address.port)
            }
            None => (None, None),
        };
        full.push_str(&path);
        if let Some(query) = &query {
            full.push('?');
            full.push_str(query);
        }

        Self {
            full,
            scheme: scope.scheme.clone(),
            host,
            port,
            path,
            query,
        }
    }

    /// URL scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host, if the transport reported one.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Port, if the transport reported one.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Percent-decoded path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The full URL string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl std::fmt::Display for Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

impl PartialEq<&str> for Url {
    fn eq(&self, other: &&str) -> bool {
        self.full == *other
    }
}
