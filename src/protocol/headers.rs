//! Header and cookie collections.
//!
//! Both stores are pure data: parsed once by the request decoder, then
//! queried read-only for the rest of the request lifetime. Header lookup is
//! case-insensitive; names are normalized to lowercase at insertion time.

use std::collections::HashMap;

/// Case-insensitive lookup over parsed request headers.
///
/// A repeated header name overwrites the previous value; multi-value
/// semantics beyond simple line folding are deliberately out of scope.
#[derive(Debug, Clone, Default)]
pub struct HeaderStore {
    headers: HashMap<String, String>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Stores a header, normalizing the name to lowercase.
    pub fn insert<V: Into<String>>(&mut self, name: &str, value: V) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Appends folded continuation text to an already stored header.
    ///
    /// The continuation is appended verbatim, with no joining space.
    pub fn append(&mut self, name: &str, continuation: &str) {
        if let Some(value) = self.headers.get_mut(&name.to_ascii_lowercase()) {
            value.push_str(continuation);
        }
    }

    /// Returns the header value, or `None` if the header is not present.
    /// The name is matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderStore {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut store = Self::new();
        for (name, value) in iter {
            store.insert(&name.into(), value);
        }
        store
    }
}

/// Lookup over request cookies. Cookie names are matched verbatim.
#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    cookies: HashMap<String, String>,
}

impl CookieStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses a `Cookie` request header.
    ///
    /// Items are split on `;`, each split once on the first `=`. Cookies are
    /// non-critical, so malformed items are skipped rather than failing the
    /// whole request.
    pub fn parse(header_value: &str) -> Self {
        let mut cookies = HashMap::new();
        for item in header_value.split(';') {
            if let Some((name, value)) = item.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.insert(name.to_owned(), value.trim().to_owned());
                }
            }
        }
        Self { cookies }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}
