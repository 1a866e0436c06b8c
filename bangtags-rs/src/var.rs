//! Per-user bangtag variable store.
//!
//! The persistent store lives behind the [`VariableStore`] collaborator; an
//! invocation works on a [`VarStore`] snapshot loaded at the start of the pass
//! and written back once at the end with [`VarStore::commit`], which only
//! touches keys that actually changed.
//!
//! Keys starting with `_` are interpreter state (identity aliases, media
//! descriptions, word counters, capture buffers) and cannot be written with
//! the generic `var` command.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::HostError;
use crate::host::VariableStore;

/// Prefix marking interpreter-internal keys.
pub const RESERVED_PREFIX: char = '_';

/// When set, bangtag processing is skipped for the user entirely.
pub const DISABLE_KEY: &str = "_bangtags:disable";

/// Returns `true` if `name` is an interpreter-internal key.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Working copy of one user's variables.
#[derive(Debug, Default, Clone)]
pub struct VarStore {
    vars: BTreeMap<String, String>,
    /// Values as last seen in the backing store, for diffing on commit.
    loaded: BTreeMap<String, String>,
    /// Keys whose changes must not be persisted (`once`).
    ephemeral: BTreeSet<String>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `user`'s variables from the backing store.
    pub fn load(store: &dyn VariableStore, user: &str) -> Result<Self, HostError> {
        let mut vars = BTreeMap::new();
        for key in store.keys(user)? {
            if let Some(value) = store.get(user, &key)? {
                vars.insert(key, value);
            }
        }
        Ok(Self {
            loaded: vars.clone(),
            vars,
            ephemeral: BTreeSet::new(),
        })
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Get the string value of a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Get the value of a variable parsed as an integer.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.vars.get(name)?.trim().parse().ok()
    }

    /// Remove a variable.  Returns `true` if it existed.
    pub fn unset(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    /// Returns `true` if the variable is set.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Absorb one captured chunk into `name`.
    ///
    /// The first chunk assigns with leading whitespace trimmed; later chunks
    /// append with trailing whitespace trimmed.
    pub fn capture(&mut self, name: &str, chunk: &str) {
        match self.vars.get_mut(name) {
            Some(value) => value.push_str(chunk.trim_end()),
            None => {
                self.vars.insert(name.to_owned(), chunk.trim_start().to_owned());
            }
        }
    }

    /// Trim trailing whitespace left over from the last captured chunk.
    pub fn finish_capture(&mut self, name: &str) {
        if let Some(value) = self.vars.get_mut(name) {
            let trimmed = value.trim_end().len();
            value.truncate(trimmed);
        }
    }

    /// Exclude `name` from the next [`commit`](Self::commit).
    pub fn mark_ephemeral(&mut self, name: impl Into<String>) {
        self.ephemeral.insert(name.into());
    }

    pub fn is_ephemeral(&self, name: &str) -> bool {
        self.ephemeral.contains(name)
    }

    /// Iterate over variables whose key starts with `prefix`, in key order.
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.vars
            .range(prefix.to_owned()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over all variables.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Write every changed, non-ephemeral key back to the store.
    ///
    /// Returns the number of writes (sets plus deletes) performed.
    pub fn commit(&mut self, store: &mut dyn VariableStore, user: &str) -> Result<usize, HostError> {
        let mut writes = 0;

        for (key, value) in &self.vars {
            if self.ephemeral.contains(key) || self.loaded.get(key) == Some(value) {
                continue;
            }
            store.set(user, key, value)?;
            self.loaded.insert(key.clone(), value.clone());
            writes += 1;
        }

        let removed: Vec<String> = self
            .loaded
            .keys()
            .filter(|k| !self.vars.contains_key(*k) && !self.ephemeral.contains(*k))
            .cloned()
            .collect();
        for key in removed {
            store.delete(user, &key)?;
            self.loaded.remove(&key);
            writes += 1;
        }

        tracing::debug!(user, writes, "committed bangtag variables");
        Ok(writes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;

    #[test]
    fn set_and_get() {
        let mut vars = VarStore::new();
        vars.set("mood", "sleepy");
        assert_eq!(vars.get("mood"), Some("sleepy"));
    }

    #[test]
    fn overwrite() {
        let mut vars = VarStore::new();
        vars.set("x", "old");
        vars.set("x", "new");
        assert_eq!(vars.get("x"), Some("new"));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn get_int_non_numeric_returns_none() {
        let mut vars = VarStore::new();
        vars.set("count", " 3 ");
        vars.set("name", "hello");
        assert_eq!(vars.get_int("count"), Some(3));
        assert_eq!(vars.get_int("name"), None);
    }

    #[test]
    fn unset() {
        let mut vars = VarStore::new();
        vars.set("gone", "bye");
        assert!(vars.unset("gone"));
        assert_eq!(vars.get("gone"), None);
        assert!(!vars.unset("gone"));
    }

    #[test]
    fn reserved_keys() {
        assert!(is_reserved("_they:are"));
        assert!(is_reserved(DISABLE_KEY));
        assert!(!is_reserved("greeting"));
    }

    #[test]
    fn capture_trims_first_then_appends() {
        let mut vars = VarStore::new();
        vars.capture("x", "  hello ");
        vars.capture("x", " world  ");
        assert_eq!(vars.get("x"), Some("hello  world"));
        vars.finish_capture("x");
        assert_eq!(vars.get("x"), Some("hello  world"));
    }

    #[test]
    fn finish_capture_trims_tail() {
        let mut vars = VarStore::new();
        vars.capture("x", "hello \n");
        vars.finish_capture("x");
        assert_eq!(vars.get("x"), Some("hello"));
    }

    #[test]
    fn with_prefix_is_ordered_and_bounded() {
        let mut vars = VarStore::new();
        vars.set("_they:are:b", "Bee");
        vars.set("_they:are:a", "Ay");
        vars.set("_they:are", "a");
        vars.set("zzz", "no");
        let found: Vec<_> = vars.with_prefix("_they:are:").collect();
        assert_eq!(found, vec![("_they:are:a", "Ay"), ("_they:are:b", "Bee")]);
    }

    #[test]
    fn commit_writes_only_changes() {
        let mut host = MemoryHost::new();
        host.set_var("alice", "keep", "same");
        host.set_var("alice", "drop", "bye");

        let mut vars = VarStore::load(&host, "alice").unwrap();
        vars.set("fresh", "hi");
        vars.unset("drop");

        let writes = vars.commit(&mut host, "alice").unwrap();
        assert_eq!(writes, 2);
        assert_eq!(host.var("alice", "keep"), Some("same"));
        assert_eq!(host.var("alice", "fresh"), Some("hi"));
        assert_eq!(host.var("alice", "drop"), None);

        // A second commit with no changes is a no-op.
        assert_eq!(vars.commit(&mut host, "alice").unwrap(), 0);
    }

    #[test]
    fn commit_skips_ephemeral_keys() {
        let mut host = MemoryHost::new();
        host.set_var("alice", "_they:are", "bob");

        let mut vars = VarStore::load(&host, "alice").unwrap();
        vars.set("_they:are", "carol");
        vars.set("_they:are:carol", "Carol");
        vars.mark_ephemeral("_they:are");
        vars.mark_ephemeral("_they:are:carol");
        assert!(vars.is_ephemeral("_they:are"));

        assert_eq!(vars.commit(&mut host, "alice").unwrap(), 0);
        assert_eq!(host.var("alice", "_they:are"), Some("bob"));
        assert_eq!(host.var("alice", "_they:are:carol"), None);
        // The working copy still sees the ephemeral values.
        assert_eq!(vars.get("_they:are"), Some("carol"));
    }
}
