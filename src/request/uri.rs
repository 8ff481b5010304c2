//! Base URI handling and request-target resolution.
//!
//! Request targets arrive in one of the forms allowed by HTTP: origin form
//! (`/path?query`), absolute form (`http://host/path`), authority form
//! (`host:port`) or asterisk form (`*`). [`BaseUri::resolve`] turns a target
//! into the request URI seen by the processing layer using reference
//! resolution against the configured base.

use std::{fmt, str::FromStr};

use http::Uri;
use thiserror::Error;

/// Errors raised while parsing a base URI or resolving a target.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UriError {
    /// The base URI could not be parsed.
    #[error("invalid base URI {input:?}: {reason}")]
    InvalidBase { input: String, reason: String },
    /// The request target could not be parsed.
    #[error("invalid request target {input:?}: {reason}")]
    InvalidTarget { input: String, reason: String },
}

/// URI against which request targets are resolved. Defaults to `/`.
///
/// # Examples
///
/// ```
/// use duplex_bridge::request::BaseUri;
///
/// let base: BaseUri = "http://example.com/api/".parse().expect("valid base");
/// assert_eq!(base.resolve("/health").expect("resolves"), "http://example.com/health");
/// assert_eq!(base.resolve("users?id=1").expect("resolves"), "http://example.com/api/users?id=1");
///
/// let root = BaseUri::default();
/// assert_eq!(root.resolve("/a/./b/../c").expect("resolves"), "/a/c");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseUri {
    raw: String,
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
}

impl Default for BaseUri {
    fn default() -> Self {
        Self {
            raw: "/".to_owned(),
            scheme: None,
            authority: None,
            path: "/".to_owned(),
        }
    }
}

impl FromStr for BaseUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| UriError::InvalidBase {
            input: s.to_owned(),
            reason,
        };
        let uri: Uri = s.parse().map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;
        if uri.scheme().is_some() != uri.authority().is_some() {
            return Err(invalid("scheme and authority must appear together".to_owned()));
        }
        let path = if uri.path().is_empty() { "/" } else { uri.path() };
        if !path.starts_with('/') {
            return Err(invalid("path must be absolute".to_owned()));
        }
        Ok(Self {
            raw: s.to_owned(),
            scheme: uri.scheme_str().map(str::to_owned),
            authority: uri.authority().map(|a| a.as_str().to_owned()),
            path: path.to_owned(),
        })
    }
}

impl fmt::Display for BaseUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.raw) }
}

impl BaseUri {
    /// The base URI as configured.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.raw }

    fn prefix(&self) -> String {
        match (&self.scheme, &self.authority) {
            (Some(scheme), Some(authority)) => format!("{scheme}://{authority}"),
            _ => String::new(),
        }
    }

    /// Resolve `target` against this base.
    ///
    /// Targets carrying a scheme (absolute form, and authority form such as
    /// `host:443`) and the asterisk form are returned unchanged. Origin-form
    /// targets keep their path and gain the base's scheme and authority.
    /// Relative paths are merged with the base path. Dot segments are
    /// removed from the resulting path.
    ///
    /// # Errors
    ///
    /// Returns [`UriError::InvalidTarget`] when `target` is empty or contains
    /// bytes not allowed in a request target.
    pub fn resolve(&self, target: &str) -> Result<String, UriError> {
        let invalid = |reason: &str| UriError::InvalidTarget {
            input: target.to_owned(),
            reason: reason.to_owned(),
        };
        if target.is_empty() {
            return Err(invalid("empty target"));
        }
        if !target.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(invalid("target contains whitespace or non-visible bytes"));
        }
        if target == "*" {
            return Ok(target.to_owned());
        }
        if has_scheme(target) {
            target
                .parse::<Uri>()
                .map_err(|e| invalid(&e.to_string()))?;
            return Ok(target.to_owned());
        }
        if target.starts_with("//") {
            return Ok(match &self.scheme {
                Some(scheme) => format!("{scheme}:{target}"),
                None => target.to_owned(),
            });
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let merged = if path.starts_with('/') {
            path.to_owned()
        } else if path.is_empty() {
            self.path.clone()
        } else {
            let dir_end = self.path.rfind('/').map_or(0, |i| i + 1);
            format!("{}{path}", &self.path[..dir_end])
        };

        let mut resolved = self.prefix();
        resolved.push_str(&remove_dot_segments(&merged));
        if let Some(query) = query {
            resolved.push('?');
            resolved.push_str(query);
        }
        Ok(resolved)
    }
}

/// Whether `target` starts with `scheme ":"` as defined by RFC 3986.
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Remove `.` and `..` segments from an absolute path.
fn remove_dot_segments(path: &str) -> String {
    let mut output: Vec<&str> = Vec::new();
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." => {
                if i == last {
                    output.push("");
                }
            }
            ".." => {
                output.pop();
                if i == last {
                    output.push("");
                }
            }
            other => output.push(other),
        }
    }
    format!("/{}", output.join("/"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{BaseUri, UriError, remove_dot_segments};

    #[rstest]
    #[case("/", "/")]
    #[case("/a/b/c/./../../g", "/a/g")]
    #[case("/a/..", "/")]
    #[case("/a/b/.", "/a/b/")]
    #[case("/../x", "/x")]
    fn removes_dot_segments(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(remove_dot_segments(input), expected);
    }

    #[rstest]
    #[case("/", "/items?page=2", "/items?page=2")]
    #[case("/", "*", "*")]
    #[case("/", "http://other.example/x", "http://other.example/x")]
    #[case("/app/", "items", "/app/items")]
    #[case("/app/index", "items", "/app/items")]
    #[case("http://h.example:8080/app/", "/x", "http://h.example:8080/x")]
    #[case("http://h.example/app/", "../up", "http://h.example/up")]
    #[case("http://h.example/app/", "?q=1", "http://h.example/app/?q=1")]
    #[case("/", "example.com:443", "example.com:443")]
    fn resolves_targets(#[case] base: &str, #[case] target: &str, #[case] expected: &str) {
        let base: BaseUri = base.parse().expect("valid base");
        assert_eq!(base.resolve(target).expect("target resolves"), expected);
    }

    #[rstest]
    fn default_base_is_root() {
        assert_eq!(BaseUri::default().as_str(), "/");
        assert_eq!(BaseUri::default(), "/".parse().expect("root parses"));
    }

    #[rstest]
    fn invalid_target_is_reported() {
        let err = BaseUri::default()
            .resolve("/bad path")
            .expect_err("spaces are not allowed");
        assert!(matches!(err, UriError::InvalidTarget { .. }));
    }

    #[rstest]
    fn relative_base_is_rejected() {
        let err = "relative/base"
            .parse::<BaseUri>()
            .expect_err("base path must be absolute");
        assert!(matches!(err, UriError::InvalidBase { .. }));
    }
}
