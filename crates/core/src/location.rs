//! Browsable location parsing and host/path predicates.

use std::fmt;

use regex::Regex;
use tracing::warn;
use url::Url;

use crate::error::LocationError;

/// The current page location split into the parts page mods match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
    host: String,
}

impl Location {
    /// Parse an absolute href.
    ///
    /// `host` follows the browser's `location.host`: hostname plus an
    /// explicit, non-default port.
    pub fn parse(href: &str) -> Result<Self, LocationError> {
        let url = Url::parse(href).map_err(|source| LocationError::Parse {
            href: href.to_string(),
            source,
        })?;
        let hostname = url
            .host_str()
            .ok_or_else(|| LocationError::MissingHost(href.to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{hostname}:{port}"),
            None => hostname.to_string(),
        };
        Ok(Self { url, host })
    }

    pub fn href(&self) -> &str {
        self.url.as_str()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Path segment by index, ignoring the leading slash (`/d/abc` → 0 = `d`, 1 = `abc`).
    pub fn path_segment(&self, index: usize) -> Option<&str> {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.nth(index))
            .filter(|s| !s.is_empty())
    }

    /// All decoded query parameters in URL order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Decoded value of the first query parameter named `key`.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.href())
    }
}

/// Host AND path regular-expression predicate for a page mod.
#[derive(Debug, Clone)]
pub struct LocationMatcher {
    host: Regex,
    path: Regex,
}

impl LocationMatcher {
    pub fn new(host_pattern: &str, path_pattern: &str) -> Result<Self, LocationError> {
        Ok(Self {
            host: compile(host_pattern)?,
            path: compile(path_pattern)?,
        })
    }

    pub fn matches(&self, location: &Location) -> bool {
        self.host.is_match(location.host()) && self.path.is_match(location.path())
    }

    /// Match a raw href; an unparsable href is logged and treated as a non-match.
    pub fn matches_href(&self, href: &str) -> bool {
        match Location::parse(href) {
            Ok(location) => self.matches(&location),
            Err(e) => {
                warn!(href, error = %e, "cannot evaluate location predicate");
                false
            }
        }
    }

    pub fn host_pattern(&self) -> &str {
        self.host.as_str()
    }

    pub fn path_pattern(&self) -> &str {
        self.path.as_str()
    }
}

fn compile(pattern: &str) -> Result<Regex, LocationError> {
    Regex::new(pattern).map_err(|source| LocationError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_includes_explicit_port() {
        let loc = Location::parse("http://localhost:3000/d/abc/overview?from=now-6h").unwrap();
        assert_eq!(loc.host(), "localhost:3000");
        assert_eq!(loc.path(), "/d/abc/overview");
        assert_eq!(loc.query(), Some("from=now-6h"));
        assert_eq!(loc.path_segment(0), Some("d"));
        assert_eq!(loc.path_segment(1), Some("abc"));
        assert_eq!(loc.query_param("from").as_deref(), Some("now-6h"));
    }

    #[test]
    fn default_port_is_dropped() {
        let loc = Location::parse("https://grafana.example.com:443/").unwrap();
        assert_eq!(loc.host(), "grafana.example.com");
        assert_eq!(loc.path_segment(0), None);
    }

    #[test]
    fn matcher_requires_host_and_path() {
        let m = LocationMatcher::new(r"^grafana\.example\.com$", r"^/d/.*$").unwrap();
        assert!(m.matches_href("https://grafana.example.com/d/abc"));
        assert!(!m.matches_href("https://grafana.example.com/alerting/list"));
        assert!(!m.matches_href("https://other.example.com/d/abc"));
    }

    #[test]
    fn unparsable_href_is_a_non_match() {
        let m = LocationMatcher::new(".*", ".*").unwrap();
        assert!(!m.matches_href("not a url"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let err = LocationMatcher::new("(", ".*").unwrap_err();
        assert!(matches!(err, LocationError::Pattern { .. }));
    }
}
