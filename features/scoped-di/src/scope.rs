use std::fmt::Display;

/// Lifetime levels a [`crate::Context`] can have.
///
/// Ordered `Root < App < Handler`. Handler scopes may nest inside handler scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeKind {
    /// Holds bootstrap values and overrides, never caches factory products
    Root,
    /// Lives as long as the application
    App,
    /// Lives as long as a single handled operation
    Handler,
}

impl ScopeKind {
    /// The kind of context created when entering the next scope from this one
    pub fn next(self) -> ScopeKind {
        match self {
            ScopeKind::Root => ScopeKind::App,
            ScopeKind::App | ScopeKind::Handler => ScopeKind::Handler,
        }
    }
}

impl Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScopeKind::Root => "root",
            ScopeKind::App => "app",
            ScopeKind::Handler => "handler",
        })
    }
}
