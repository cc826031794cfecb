//! Prefix-based path routing.
//!
//! Routes bind a path to a handler identifier. Resolution scans entries in
//! registration order and the first match wins, so exact "leaf" routes and
//! broader "namespace" prefixes can share a base path as long as the more
//! specific route is registered first. No overlap detection is performed.

use crate::protocol::HttpError;

/// An immutable binding of a registration path to a handler identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    path: String,
    prefix: String,
    service: String,
}

impl RouteEntry {
    /// Normalizes the path to start with `/` and precomputes the match
    /// prefix (path plus a single trailing `/`). Normalization is
    /// idempotent: `"foo"`, `"/foo"` and `"/foo/"` all match alike.
    fn new<S: Into<String>>(path: &str, service: S) -> Self {
        let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
        let prefix = if path.ends_with('/') { path.clone() } else { format!("{path}/") };
        Self { path, prefix, service: service.into() }
    }

    /// Checks the entry against a normalized request path.
    ///
    /// Returns the action suffix on a match: empty for an exact path match,
    /// otherwise the remainder after the prefix.
    fn matches(&self, path: &str) -> Option<String> {
        if self.path == path {
            return Some(String::new());
        }
        path.strip_prefix(&self.prefix).map(str::to_owned)
    }

    /// Registration path, always absolute.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Identifier of the handler serving this route.
    pub fn service(&self) -> &str {
        &self.service
    }
}

/// Ordered route table. Read-only after startup.
#[derive(Debug, Default)]
pub struct Router {
    entries: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a route. Registration order is semantically significant:
    /// earlier entries shadow later overlapping ones.
    pub fn add<S: Into<String>>(&mut self, path: &str, service: S) {
        self.entries.push(RouteEntry::new(path, service));
    }

    /// Resolves a request path to the first matching route plus its action
    /// suffix, or [`HttpError::RouteNotFound`].
    pub fn resolve(&self, path: &str) -> Result<(&RouteEntry, String), HttpError> {
        let normalized;
        let path = if path.starts_with('/') {
            path
        } else {
            normalized = format!("/{path}");
            &normalized
        };

        for entry in &self.entries {
            if let Some(action) = entry.matches(path) {
                return Ok((entry, action));
            }
        }

        Err(HttpError::RouteNotFound)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
