//! Shell-style wildcard matching.
//!
//! Filters use `glob` syntax (`*`, `?`, `[abc]`). `*` also matches `/`, so
//! `release/*` matches `release/1.2/hotfix`. A filter that is not a valid
//! pattern only matches itself literally.

use glob::Pattern;

/// Whether `candidate` matches any of `filters`.
#[must_use]
pub fn match_string<S>(candidate: &str, filters: &[S]) -> bool
where
    S: AsRef<str>,
{
    filters
        .iter()
        .any(|filter| matches_filter(candidate, filter.as_ref()))
}

fn matches_filter(candidate: &str, filter: &str) -> bool {
    Pattern::new(filter).map_or_else(|_| candidate == filter, |p| p.matches(candidate))
}

/// Map whose keys are wildcard patterns.
///
/// [`get`](Self::get) returns the value of the first key, in insertion
/// order, whose pattern matches the lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKeysMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for MatchKeysMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> MatchKeysMap<V> {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `pattern`, returning the value it replaced.
    pub fn insert(&mut self, pattern: impl Into<String>, value: V) -> Option<V> {
        let pattern = pattern.into();
        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == pattern) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((pattern, value));
        None
    }

    /// First value whose pattern matches `key`, falling back to an exact key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(pattern, _)| matches_filter(key, pattern))
            .or_else(|| self.entries.iter().find(|(pattern, _)| pattern == key))
            .map(|(_, value)| value)
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Patterns and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for MatchKeysMap<V>
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (pattern, value) in iter {
            map.insert(pattern, value);
        }
        map
    }
}
