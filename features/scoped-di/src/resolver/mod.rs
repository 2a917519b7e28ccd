use std::{any::type_name, collections::HashSet, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

use crate::{
    cache::{Cached, Lookup},
    context::{Claim, Context},
    dependency::{Args, Dependency, DependencyKey, Param},
    errors::{ImplicitOrigin, InjectError},
    factories::{Factory, FactoryId, FactoryInfo},
    scope::ScopeKind,
    types::{Injectable, Instance, TypeInfo},
};

mod normalize;
mod stack;

pub(crate) use stack::ResolutionStack;

impl Context {
    /// Resolves a single dependency from this context
    ///
    /// Values are cached in the scope the factory belongs to, so resolving the same
    /// dependency twice yields the same value until that scope exits.
    pub async fn create(&self, dependency: &Dependency) -> Result<Instance, InjectError> {
        self.ensure_open()?;
        let mut stack = ResolutionStack::default();
        resolve(self, self, dependency, &mut stack).await
    }

    /// [`Context::create`] followed by a downcast
    pub async fn resolve<T: Injectable>(&self, dependency: &Dependency) -> Result<Arc<T>, InjectError> {
        let instance = self.create(dependency).await?;
        instance
            .downcast()
            .map_err(|actual_type| InjectError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    /// Resolves every parameter, without calling anything with them
    pub async fn create_all(&self, params: &[Param]) -> Result<Args, InjectError> {
        self.ensure_open()?;
        let mut stack = ResolutionStack::default();
        resolve_params(self, self, params, &mut stack).await
    }
}

/// Resolves `dependency` from `ctx`
///
/// `origin` is the context the whole resolution started from. Its registries may hold
/// names `ctx` can't see, which are reported as scope violations rather than unbound.
pub(crate) fn resolve<'a>(
    ctx: &'a Context,
    origin: &'a Context,
    dependency: &'a Dependency,
    stack: &'a mut ResolutionStack,
) -> BoxFuture<'a, Result<Instance, InjectError>> {
    async move {
        match dependency.key() {
            DependencyKey::Explicit(factory) => {
                resolve_factory(ctx, origin, factory, dependency.wrappers(), stack).await
            }
            DependencyKey::Implicit { name, expected } => {
                resolve_implicit(ctx, origin, name, *expected, dependency.wrappers(), stack).await
            }
        }
    }
    .boxed()
}

/// Resolves every parameter in declaration order
pub(crate) async fn resolve_params(
    ctx: &Context,
    origin: &Context,
    params: &[Param],
    stack: &mut ResolutionStack,
) -> Result<Args, InjectError> {
    check_explicit_scopes(ctx, params)?;

    let mut args = Args::with_capacity(params.len());
    for param in params {
        let instance = resolve(ctx, origin, &param.dependency, stack).await?;
        args.push(param.name.clone(), instance);
    }
    Ok(args)
}

async fn resolve_implicit(
    ctx: &Context,
    origin: &Context,
    name: &str,
    expected: TypeInfo,
    wrappers: usize,
    stack: &mut ResolutionStack,
) -> Result<Instance, InjectError> {
    let (instance, source) = match ctx.implicit_factory(name) {
        Some(factory) => (
            resolve_factory(ctx, origin, factory, wrappers, stack).await?,
            ImplicitOrigin::ImplicitFactory,
        ),
        None => {
            // Registered further down, e.g. by the handler an app factory is resolved for
            if let Some(hidden) = origin.implicit_factory(name) {
                if ctx.owner_for(hidden.scope()).is_none() {
                    return Err(scope_violation(hidden, ctx.kind()));
                }
            }
            match ctx.bootstrap_value(name) {
                Some(value) => (value.clone(), ImplicitOrigin::Bootstrap),
                None => {
                    return Err(InjectError::Unbound {
                        name: name.to_string(),
                    })
                }
            }
        }
    };

    if instance.info.type_id != expected.type_id {
        return Err(InjectError::TypeMismatch {
            name: name.to_string(),
            origin: source,
            expected,
            actual: instance.info.type_name,
        });
    }
    Ok(instance)
}

async fn resolve_factory(
    ctx: &Context,
    origin: &Context,
    factory: &Factory,
    wrappers: usize,
    stack: &mut ResolutionStack,
) -> Result<Instance, InjectError> {
    let info = factory.info();
    let owner = ctx
        .owner_for(factory.scope())
        .ok_or_else(|| scope_violation(factory, ctx.kind()))?;

    // Cached under the replaced factory, produced by the replacement
    let effective = ctx.override_for(info.id).unwrap_or(factory);
    let unwrap = normalize::needs_unwrap(effective, info, wrappers)?;
    stack.check(info)?;

    let claim = match owner.lookup_or_claim(info.id)? {
        Lookup::Ready(cached) => {
            tracing::trace!("Reusing cached {} from {} scope", info, owner.kind());
            return reuse(info, cached, unwrap);
        }
        Lookup::Wait(waiter) => {
            tracing::trace!("Waiting on concurrent resolution of {}", info);
            let cached = waiter.await.map_err(|_| InjectError::Abandoned(info))??;
            return reuse(info, cached, unwrap);
        }
        Lookup::Claimed => Claim::new(owner, info.id),
    };

    stack.push(info);
    let produced = produce(owner, origin, info, effective, unwrap, stack).await;
    stack.pop();

    match produced {
        Ok(instance) => {
            claim.fulfil(Cached {
                instance: instance.clone(),
                unwrapped: unwrap,
            });
            Ok(instance)
        }
        Err(error) => {
            claim.fail(&error);
            Err(error)
        }
    }
}

/// Walks the explicit dependencies below `params` before any of them is produced
///
/// An unreachable scope anywhere in that graph fails the resolution before a single
/// factory of it was called. Implicit dependencies are only known once looked up.
fn check_explicit_scopes(ctx: &Context, params: &[Param]) -> Result<(), InjectError> {
    let mut seen = HashSet::new();
    params
        .iter()
        .try_for_each(|param| check_dependency_scope(ctx, &param.dependency, &mut seen))
}

fn check_dependency_scope(
    ctx: &Context,
    dependency: &Dependency,
    seen: &mut HashSet<(FactoryId, ScopeKind)>,
) -> Result<(), InjectError> {
    let DependencyKey::Explicit(factory) = dependency.key() else {
        return Ok(());
    };
    if !seen.insert((factory.id(), ctx.kind())) {
        return Ok(());
    }

    let owner = ctx
        .owner_for(factory.scope())
        .ok_or_else(|| scope_violation(factory, ctx.kind()))?;
    let effective = ctx.override_for(factory.id()).unwrap_or(factory);
    effective
        .params()
        .iter()
        .try_for_each(|param| check_dependency_scope(owner, &param.dependency, seen))
}

fn scope_violation(factory: &Factory, context: ScopeKind) -> InjectError {
    InjectError::ScopeViolation {
        dependency: factory.info(),
        scope: factory.scope(),
        context,
    }
}

fn reuse(info: FactoryInfo, cached: Cached, unwrap: bool) -> Result<Instance, InjectError> {
    if cached.unwrapped != unwrap {
        return Err(InjectError::FormConflict {
            factory: info,
            cached_unwrapped: cached.unwrapped,
        });
    }
    Ok(cached.instance)
}

async fn produce(
    owner: &Context,
    origin: &Context,
    info: FactoryInfo,
    factory: &Factory,
    unwrap: bool,
    stack: &mut ResolutionStack,
) -> Result<Instance, InjectError> {
    let args = resolve_params(owner, origin, factory.params(), stack).await?;

    tracing::debug!(
        "Invoking {} for {} scope at depth {}",
        factory.info(),
        owner.kind(),
        stack.depth()
    );
    let product = factory.construct(args).map_err(normalize::failed(info))?;
    normalize::normalize(owner, info, product, unwrap).await
}
