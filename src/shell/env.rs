//! Environment overlay for spawned commands.
//!
//! Overrides are merged onto a base environment and always win. An override
//! whose value mentions its own variable name is interpolated with the value
//! that variable currently has in the base, so `PATH = "$PATH:/opt/bin"`
//! appends to the inherited search path instead of replacing it.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use regex::Regex;

/// Caller-supplied variables layered over an optional inherited environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOverlay {
    overrides: BTreeMap<String, String>,
    inherit: bool,
}

impl Default for EnvOverlay {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            inherit: true,
        }
    }
}

impl EnvOverlay {
    /// Empty overlay that inherits the current process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the resolved environment starts from the current process
    /// environment (`true`) or from nothing (`false`).
    #[must_use]
    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = inherit;
        self
    }

    /// Add or replace one override.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Add or replace several overrides.
    #[must_use]
    pub fn vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.overrides
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Configured overrides, before interpolation.
    #[must_use]
    pub fn overrides(&self) -> &BTreeMap<String, String> {
        &self.overrides
    }

    /// Whether the current process environment is inherited.
    #[must_use]
    pub fn inherits(&self) -> bool {
        self.inherit
    }

    /// Overrides with self-references interpolated against the current
    /// process environment, without the inherited variables.
    ///
    /// This is what a spawned command needs on top of its inherited
    /// environment.
    #[must_use]
    pub fn resolved_overrides(&self) -> HashMap<String, String> {
        let current: HashMap<String, String> = self
            .overrides
            .keys()
            .filter_map(|name| Some((name.clone(), std::env::var(name).ok()?)))
            .collect();
        let mut resolved = HashMap::with_capacity(self.overrides.len());
        interpolate_values(&mut resolved, &self.overrides, &current);
        resolved
    }

    /// Resolve against the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped; use
    /// [`resolved_overrides`](Self::resolved_overrides) to layer onto the
    /// inherited environment without losing them.
    #[must_use]
    pub fn resolve(&self) -> HashMap<String, String> {
        let current: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        self.resolve_with(&current)
    }

    /// Resolve against an explicit base environment.
    ///
    /// The base is used both for inheritance (when enabled) and as the source
    /// of interpolated values.
    #[must_use]
    pub fn resolve_with<S>(&self, base: &HashMap<String, String, S>) -> HashMap<String, String>
    where
        S: BuildHasher,
    {
        let mut resolved: HashMap<String, String> = if self.inherit {
            base.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        } else {
            HashMap::new()
        };
        interpolate_values(&mut resolved, &self.overrides, base);
        resolved
    }
}

/// Write every entry of `overrides` into `target`, replacing references to
/// the entry's own name with its value from `base`.
///
/// `${NAME}`, `$NAME`, and the bare `NAME` are all substituted in one pass;
/// a variable missing from `base` interpolates as the empty string.
pub fn interpolate_values<T, S>(
    target: &mut HashMap<String, String, T>,
    overrides: &BTreeMap<String, String>,
    base: &HashMap<String, String, S>,
) where
    T: BuildHasher,
    S: BuildHasher,
{
    for (name, value) in overrides {
        let value = if name.is_empty() || !value.contains(name.as_str()) {
            value.clone()
        } else {
            let current = base.get(name).map_or("", String::as_str);
            self_reference(name).map_or_else(
                || value.replace(name.as_str(), current),
                |pattern| pattern.replace_all(value, regex::NoExpand(current)).into_owned(),
            )
        };
        target.insert(name.clone(), value);
    }
}

fn self_reference(name: &str) -> Option<Regex> {
    let escaped = regex::escape(name);
    Regex::new(&format!(r"\$\{{{escaped}\}}|\${escaped}|{escaped}")).ok()
}
