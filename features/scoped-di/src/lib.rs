//! Scoped dependency resolution
//!
//! Values are produced by [`Factory`]s and cached per scope. Scopes form a chain,
//! Root -> App -> Handler (-> Handler ...), entered with [`Context::enter_next_scope`]:
//!
//! ```
//! use std::convert::Infallible;
//!
//! use scoped_di::{Context, Factory, ImplicitFactories, InvokableBuilder};
//!
//! let port = Factory::builder("port")
//!     .app_scoped()
//!     .value(|_| Ok::<_, Infallible>(8080_u16));
//! let handler = InvokableBuilder::new("handler")
//!     .explicit("port", &port)
//!     .call(|args| args.get::<u16>("port").map(|port| *port));
//!
//! futures::executor::block_on(async {
//!     let app = Context::root().enter_next_scope(ImplicitFactories::new()).unwrap();
//!     let request = app.context().enter_next_scope(ImplicitFactories::new()).unwrap();
//!
//!     let port = request.context().invoke(&handler).await.unwrap().unwrap();
//!     assert_eq!(port, 8080);
//!
//!     request.close().await.unwrap();
//!     app.close().await.unwrap();
//! });
//! ```
//!
//! Factories may also hand out resources ([`SyncResource`], [`AsyncResource`]) which are
//! entered on resolution and released, last acquired first, when their scope exits.

mod builder;
mod cache;
mod context;
mod dependency;
mod errors;
mod factories;
mod invoke;
mod registry;
mod resolver;
mod resources;
mod scope;
mod transition;
mod types;

pub use builder::RootBuilder;
pub use context::Context;
pub use dependency::{Args, Dependency, DependencyKey, Param};
pub use errors::{ImplicitOrigin, InjectError, ReleaseError, ReleaseFailure, ScopeFailure};
pub use factories::{
    AsyncResource, Deferred, Factory, FactoryBuilder, FactoryId, FactoryInfo, Shape, SyncResource,
};
pub use invoke::{invoke, invoke_with, Invokable, InvokableBuilder};
pub use registry::ImplicitFactories;
pub use scope::ScopeKind;
pub use transition::ScopeGuard;
pub use types::{DynError, Injectable, Instance, TypeInfo};
