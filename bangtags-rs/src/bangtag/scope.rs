//! The scope stack.
//!
//! Every open region of a post (a capture, a filter, a hidden span, a
//! comment, a draft) is one [`Scope`] on a single stack.  Where output goes
//! is decided by the innermost scope that is not a filter; which filters run
//! is every [`Scope::Transform`] on the stack.

use super::filter::Filter;

/// One open scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Chunks are appended to the named variable.
    Capture(String),
    /// Chunks pass through `filter`; `slot` identifies the scope's state.
    Transform { filter: Filter, slot: usize },
    /// Chunks are dropped and commands are swallowed.
    Discard,
    /// Commands are copied through as text.
    Raw,
    /// Everything that follows is frozen verbatim.
    Draft,
}

/// Discriminant of a [`Scope`], for targeted closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Capture,
    Transform,
    Discard,
    Raw,
    Draft,
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Capture(_) => ScopeKind::Capture,
            Scope::Transform { .. } => ScopeKind::Transform,
            Scope::Discard => ScopeKind::Discard,
            Scope::Raw => ScopeKind::Raw,
            Scope::Draft => ScopeKind::Draft,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    entries: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope) {
        self.entries.push(scope);
    }

    /// Close the innermost scope, whatever it is.
    pub fn pop(&mut self) -> Option<Scope> {
        self.entries.pop()
    }

    pub fn top(&self) -> Option<&Scope> {
        self.entries.last()
    }

    pub fn top_is(&self, kind: ScopeKind) -> bool {
        self.top().is_some_and(|s| s.kind() == kind)
    }

    pub fn contains(&self, kind: ScopeKind) -> bool {
        self.entries.iter().any(|s| s.kind() == kind)
    }

    /// The scope that receives output: the innermost one that is not a filter.
    pub fn sink(&self) -> Option<&Scope> {
        self.entries.iter().rev().find(|s| s.kind() != ScopeKind::Transform)
    }

    /// Active filters with their slots, innermost first.
    pub fn filters(&self) -> impl Iterator<Item = (usize, &Filter)> {
        self.entries.iter().rev().filter_map(|s| match s {
            Scope::Transform { filter, slot } => Some((*slot, filter)),
            _ => None,
        })
    }

    /// Close the innermost scope of `kind`.
    pub fn remove_innermost(&mut self, kind: ScopeKind) -> Option<Scope> {
        let at = self.entries.iter().rposition(|s| s.kind() == kind)?;
        Some(self.entries.remove(at))
    }

    /// Close every scope of `kind`, innermost first.
    pub fn remove_all(&mut self, kind: ScopeKind) -> Vec<Scope> {
        let (mut removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(|s| s.kind() == kind);
        self.entries = kept;
        removed.reverse();
        removed
    }

    /// Close everything, innermost first.
    pub fn clear(&mut self) -> Vec<Scope> {
        let mut removed = std::mem::take(&mut self.entries);
        removed.reverse();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
