use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    builder::RootBuilder,
    cache::{Cached, Lookup, ScopeCache},
    errors::InjectError,
    factories::{Factory, FactoryId},
    registry::ImplicitFactories,
    resources::{OwnedResource, ResourceStack},
    scope::ScopeKind,
    types::Instance,
};

/// State given to the root context, shared by every context below it
pub(crate) struct RootState {
    pub(crate) overrides: HashMap<FactoryId, Factory>,
    pub(crate) bootstrap: HashMap<String, Instance>,
}

/// One active lifetime scope
///
/// Cheap to clone, clones refer to the same scope. A child holds its parent alive,
/// a parent never refers to its children.
#[derive(Clone)]
pub struct Context(Arc<ContextInner>);
struct ContextInner {
    kind: ScopeKind,
    parent: Option<Context>,
    root: Arc<RootState>,
    implicit: ImplicitFactories,
    state: Mutex<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    cache: ScopeCache,
    resources: ResourceStack,
    closed: bool,
}

impl Context {
    /// Root context without bootstrap values or overrides
    pub fn root() -> Context {
        RootBuilder::new().build()
    }

    /// Builder for a root context
    pub fn root_builder() -> RootBuilder {
        RootBuilder::new()
    }

    pub(crate) fn new_root(root: RootState) -> Context {
        Context(Arc::new(ContextInner {
            kind: ScopeKind::Root,
            parent: None,
            root: Arc::new(root),
            implicit: ImplicitFactories::default(),
            state: Mutex::new(ScopeState::default()),
        }))
    }

    pub(crate) fn new_child(&self, implicit: ImplicitFactories) -> Context {
        Context(Arc::new(ContextInner {
            kind: self.kind().next(),
            parent: Some(self.clone()),
            root: self.0.root.clone(),
            implicit,
            state: Mutex::new(ScopeState::default()),
        }))
    }

    pub fn kind(&self) -> ScopeKind {
        self.0.kind
    }

    pub fn parent(&self) -> Option<&Context> {
        self.0.parent.as_ref()
    }

    /// This context followed by all enclosing contexts up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = &Context> {
        std::iter::successors(Some(self), |ctx| ctx.parent())
    }

    /// Whether both handles refer to the same scope
    pub fn same_scope(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Number of values cached in this scope
    pub fn cached_count(&self) -> usize {
        self.state().cache.len()
    }

    /// Number of resources this scope will release on exit
    pub fn owned_resources(&self) -> usize {
        self.state().resources.len()
    }

    pub(crate) fn ensure_open(&self) -> Result<(), InjectError> {
        match self.ancestors().find(|ctx| ctx.is_closed()) {
            Some(closed) => Err(InjectError::ScopeClosed(closed.kind())),
            None => Ok(()),
        }
    }

    /// Nearest context which caches products of the given factory scope
    pub(crate) fn owner_for(&self, scope: ScopeKind) -> Option<&Context> {
        self.ancestors().find(|ctx| ctx.kind() == scope)
    }

    /// Looks up an implicit factory, innermost scope first
    pub(crate) fn implicit_factory(&self, name: &str) -> Option<&Factory> {
        self.ancestors().find_map(|ctx| ctx.0.implicit.get(name))
    }

    pub(crate) fn bootstrap_value(&self, name: &str) -> Option<&Instance> {
        self.0.root.bootstrap.get(name)
    }

    pub(crate) fn override_for(&self, id: FactoryId) -> Option<&Factory> {
        self.0.root.overrides.get(&id)
    }

    pub(crate) fn lookup_or_claim(&self, id: FactoryId) -> Result<Lookup, InjectError> {
        let mut state = self.state();
        if state.closed {
            return Err(InjectError::ScopeClosed(self.kind()));
        }
        Ok(state.cache.lookup_or_claim(id))
    }

    /// Hands a resource to this scope, or back if the scope already closed
    pub(crate) fn adopt(&self, resource: OwnedResource) -> Result<(), OwnedResource> {
        let mut state = self.state();
        if state.closed {
            return Err(resource);
        }
        tracing::debug!("{} scope owns {}", self.kind(), resource.name());
        state.resources.push(resource);
        Ok(())
    }

    /// Marks the scope as closed, its resources stay owned until taken out
    pub(crate) fn close(&self) {
        self.state().closed = true;
    }

    /// The resource to release next, the last one acquired
    pub(crate) fn take_last_resource(&self) -> Option<OwnedResource> {
        self.state().resources.pop()
    }

    /// Every resource still owned, last acquired first
    pub(crate) fn take_resources(&self) -> Vec<OwnedResource> {
        self.state().resources.take_lifo()
    }

    fn state(&self) -> MutexGuard<'_, ScopeState> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Context")
            .field("kind", &self.0.kind)
            .field("cached", &state.cache.len())
            .field("resources", &state.resources.len())
            .field("implicit", &self.0.implicit.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Exclusive right to produce the value of a cache slot
///
/// Dropping an unfinished claim frees the slot, so waiters don't wait forever.
pub(crate) struct Claim<'a> {
    owner: &'a Context,
    id: FactoryId,
    finished: bool,
}

impl<'a> Claim<'a> {
    pub(crate) fn new(owner: &'a Context, id: FactoryId) -> Self {
        Self {
            owner,
            id,
            finished: false,
        }
    }

    pub(crate) fn fulfil(mut self, cached: Cached) {
        self.finished = true;
        self.owner.state().cache.fulfil(self.id, cached);
    }

    pub(crate) fn fail(mut self, error: &InjectError) {
        self.finished = true;
        self.owner.state().cache.abandon(self.id, Some(error));
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.owner.state().cache.abandon(self.id, None);
        }
    }
}
