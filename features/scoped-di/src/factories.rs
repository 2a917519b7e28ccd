use std::{
    any::type_name,
    fmt::{Debug, Display},
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use futures::{future::BoxFuture, FutureExt, TryFutureExt};

use crate::{
    dependency::{Args, Dependency, Param},
    resources::OwnedResource,
    scope::ScopeKind,
    types::{DynError, Injectable, Instance, TypeInfo},
};

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Factory`], used as cache and override key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactoryId(u64);

/// Identity and human readable label of a factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactoryInfo {
    pub id: FactoryId,
    pub label: &'static str,
}
impl Display for FactoryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label)
    }
}

/// What calling a factory produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The value itself
    Value,
    /// A [`SyncResource`] guarding the value
    SyncManaged,
    /// A future of the value
    Awaited,
    /// An [`AsyncResource`] guarding the value
    AsyncManaged,
}
impl Shape {
    /// Number of wrapper layers around the produced value
    pub fn depth(self) -> usize {
        match self {
            Shape::Value => 0,
            Shape::SyncManaged | Shape::Awaited | Shape::AsyncManaged => 1,
        }
    }
}

/// A resource which has to be entered to get its value, and is exited when its scope ends
pub trait SyncResource: Injectable {
    type Target: Injectable;

    /// Acquires the resource and returns the guarded value
    fn enter(&self) -> Result<Self::Target, DynError>;

    /// Releases the resource, called once when the owning scope exits
    fn exit(&self) -> Result<(), DynError> {
        Ok(())
    }
}

/// Asynchronous version of [`SyncResource`]
pub trait AsyncResource: Injectable {
    type Target: Injectable;

    /// Acquires the resource and returns the guarded value
    fn enter(&self) -> impl Future<Output = Result<Self::Target, DynError>> + Send + '_;

    /// Releases the resource, called once when the owning scope exits
    fn exit(&self) -> impl Future<Output = Result<(), DynError>> + Send + '_ {
        async { Ok(()) }
    }
}

/// The pending product of an [`Shape::Awaited`] factory which was requested raw
pub struct Deferred<T> {
    pending: Mutex<Option<BoxFuture<'static, Result<T, DynError>>>>,
}
impl<T> Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("type", &type_name::<T>())
            .finish()
    }
}
impl<T: Injectable> Deferred<T> {
    fn new(pending: BoxFuture<'static, Result<T, DynError>>) -> Self {
        Self {
            pending: Mutex::new(Some(pending)),
        }
    }

    /// Takes the pending computation out - returns None once taken
    pub fn take(&self) -> Option<BoxFuture<'static, Result<T, DynError>>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Output of a factory call, before it is normalized into a value
pub(crate) enum Product {
    Value(Instance),
    SyncManaged(Box<dyn ErasedSyncResource>),
    Awaited(Box<dyn ErasedPending>),
    AsyncManaged(Box<dyn ErasedAsyncResource>),
}
impl Product {
    /// The product as it is, with its wrapper kept
    pub(crate) fn into_raw(self) -> Instance {
        match self {
            Product::Value(instance) => instance,
            Product::SyncManaged(resource) => resource.into_raw(),
            Product::Awaited(pending) => pending.into_raw(),
            Product::AsyncManaged(resource) => resource.into_raw(),
        }
    }
}

pub(crate) trait ErasedSyncResource: Send {
    fn enter(&self) -> Result<Instance, DynError>;
    fn into_raw(self: Box<Self>) -> Instance;
    fn into_owned(self: Box<Self>, name: &'static str) -> OwnedResource;
}
struct SyncHolder<R>(Arc<R>);
impl<R: SyncResource> ErasedSyncResource for SyncHolder<R> {
    fn enter(&self) -> Result<Instance, DynError> {
        self.0.enter().map(Instance::new)
    }

    fn into_raw(self: Box<Self>) -> Instance {
        Instance::from_arc(self.0)
    }

    fn into_owned(self: Box<Self>, name: &'static str) -> OwnedResource {
        let resource = self.0;
        OwnedResource::blocking(name, move || resource.exit())
    }
}

pub(crate) trait ErasedAsyncResource: Send {
    fn enter(&self) -> BoxFuture<'static, Result<Instance, DynError>>;
    fn into_raw(self: Box<Self>) -> Instance;
    fn into_owned(self: Box<Self>, name: &'static str) -> OwnedResource;
}
struct AsyncHolder<R>(Arc<R>);
impl<R: AsyncResource> ErasedAsyncResource for AsyncHolder<R> {
    fn enter(&self) -> BoxFuture<'static, Result<Instance, DynError>> {
        let resource = self.0.clone();
        async move { resource.enter().await.map(Instance::new) }.boxed()
    }

    fn into_raw(self: Box<Self>) -> Instance {
        Instance::from_arc(self.0)
    }

    fn into_owned(self: Box<Self>, name: &'static str) -> OwnedResource {
        let resource = self.0;
        OwnedResource::suspending(name, move || {
            async move { resource.exit().await }.boxed()
        })
    }
}

pub(crate) trait ErasedPending: Send {
    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<Instance, DynError>>;
    fn into_raw(self: Box<Self>) -> Instance;
}
struct PendingHolder<T>(BoxFuture<'static, Result<T, DynError>>);
impl<T: Injectable> ErasedPending for PendingHolder<T> {
    fn wait(self: Box<Self>) -> BoxFuture<'static, Result<Instance, DynError>> {
        self.0.map_ok(Instance::new).boxed()
    }

    fn into_raw(self: Box<Self>) -> Instance {
        Instance::new(Deferred::new(self.0))
    }
}

type Construct = dyn Fn(Args) -> Result<Product, DynError> + Send + Sync;

/// Describes how to produce a dependency
///
/// Cheap to clone - clones share the same identity. Two factories built from the same
/// closure are still two different factories.
#[derive(Clone)]
pub struct Factory(Arc<FactoryInner>);
struct FactoryInner {
    info: FactoryInfo,
    scope: ScopeKind,
    shape: Shape,
    provides: TypeInfo,
    params: Vec<Param>,
    construct: Box<Construct>,
}

impl Factory {
    /// Starts describing a new handler scoped factory
    pub fn builder(label: &'static str) -> FactoryBuilder {
        FactoryBuilder {
            label,
            scope: ScopeKind::Handler,
            params: Vec::new(),
        }
    }

    pub fn info(&self) -> FactoryInfo {
        self.0.info
    }

    pub fn id(&self) -> FactoryId {
        self.0.info.id
    }

    pub fn scope(&self) -> ScopeKind {
        self.0.scope
    }

    pub fn shape(&self) -> Shape {
        self.0.shape
    }

    /// The type of the value once unwrapped
    pub fn provides(&self) -> TypeInfo {
        self.0.provides
    }

    pub fn params(&self) -> &[Param] {
        &self.0.params
    }

    pub(crate) fn construct(&self, args: Args) -> Result<Product, DynError> {
        (self.0.construct)(args)
    }
}

impl PartialEq for Factory {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
impl Eq for Factory {}
impl Hash for Factory {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}
impl Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("label", &self.0.info.label)
            .field("scope", &self.0.scope)
            .field("shape", &self.0.shape)
            .field("provides", &self.0.provides.type_name)
            .finish()
    }
}

/// Declares scope and parameters of a [`Factory`], finished by one of the shape methods
pub struct FactoryBuilder {
    label: &'static str,
    scope: ScopeKind,
    params: Vec<Param>,
}

impl FactoryBuilder {
    /// Products live as long as the app scope
    pub fn app_scoped(mut self) -> Self {
        self.scope = ScopeKind::App;
        self
    }

    /// Products live as long as a handler scope - the default
    pub fn handler_scoped(mut self) -> Self {
        self.scope = ScopeKind::Handler;
        self
    }

    pub fn depends(mut self, name: impl Into<String>, dependency: Dependency) -> Self {
        self.params.push(Param::new(name, dependency));
        self
    }

    /// Depends on the product of a specific factory
    pub fn explicit(self, name: impl Into<String>, factory: &Factory) -> Self {
        self.depends(name, Dependency::explicit(factory))
    }

    /// Depends on whatever is registered under the parameter's name
    pub fn implicit<T: Injectable>(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.depends(name.clone(), Dependency::implicit::<T>(name))
    }

    /// The factory returns the value directly
    pub fn value<T, E, F>(self, construct: F) -> Factory
    where
        T: Injectable,
        E: Into<DynError>,
        F: Fn(Args) -> Result<T, E> + Send + Sync + 'static,
    {
        self.finish(
            Shape::Value,
            TypeInfo::of::<T>(),
            Box::new(move |args| {
                construct(args)
                    .map(|value| Product::Value(Instance::new(value)))
                    .map_err(Into::<DynError>::into)
            }),
        )
    }

    /// The factory returns a resource which is entered synchronously
    pub fn sync_managed<R, E, F>(self, construct: F) -> Factory
    where
        R: SyncResource,
        E: Into<DynError>,
        F: Fn(Args) -> Result<R, E> + Send + Sync + 'static,
    {
        self.finish(
            Shape::SyncManaged,
            TypeInfo::of::<R::Target>(),
            Box::new(move |args| {
                construct(args)
                    .map(|resource| Product::SyncManaged(Box::new(SyncHolder(Arc::new(resource)))))
                    .map_err(Into::<DynError>::into)
            }),
        )
    }

    /// The factory returns a future of the value
    pub fn awaited<T, E, F, Fut>(self, construct: F) -> Factory
    where
        T: Injectable,
        E: Into<DynError> + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
    {
        self.finish(
            Shape::Awaited,
            TypeInfo::of::<T>(),
            Box::new(move |args| {
                let pending = construct(args).map_err(Into::<DynError>::into).boxed();
                Ok(Product::Awaited(Box::new(PendingHolder(pending))))
            }),
        )
    }

    /// The factory returns a resource which is entered asynchronously
    pub fn async_managed<R, E, F>(self, construct: F) -> Factory
    where
        R: AsyncResource,
        E: Into<DynError>,
        F: Fn(Args) -> Result<R, E> + Send + Sync + 'static,
    {
        self.finish(
            Shape::AsyncManaged,
            TypeInfo::of::<R::Target>(),
            Box::new(move |args| {
                construct(args)
                    .map(|resource| {
                        Product::AsyncManaged(Box::new(AsyncHolder(Arc::new(resource))))
                    })
                    .map_err(Into::<DynError>::into)
            }),
        )
    }

    fn finish(self, shape: Shape, provides: TypeInfo, construct: Box<Construct>) -> Factory {
        let id = FactoryId(NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed));
        Factory(Arc::new(FactoryInner {
            info: FactoryInfo {
                id,
                label: self.label,
            },
            scope: self.scope,
            shape,
            provides,
            params: self.params,
            construct,
        }))
    }
}
