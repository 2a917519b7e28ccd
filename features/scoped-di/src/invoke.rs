use std::{fmt::Debug, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

use crate::{
    context::Context,
    dependency::{Args, Dependency, Param},
    errors::InjectError,
    factories::Factory,
    resolver::{resolve_params, ResolutionStack},
    types::{Injectable, TypeInfo},
};

type Call<R> = dyn Fn(Args) -> BoxFuture<'static, R> + Send + Sync;

/// A target operation whose parameters are dependency slots
///
/// Built by [`InvokableBuilder`], run by [`invoke`]. Parameters declared as supplied
/// are passed by the caller through [`invoke_with`] instead of being resolved.
pub struct Invokable<R> {
    label: &'static str,
    params: Vec<Param>,
    supplied: Vec<(String, TypeInfo)>,
    call: Arc<Call<R>>,
}

impl<R> Invokable<R> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// The parameters resolved from the context
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Names of the parameters the caller supplies
    pub fn supplied(&self) -> impl Iterator<Item = &str> {
        self.supplied.iter().map(|(name, _)| name.as_str())
    }

    /// Rejects supplied arguments which are unknown, missing, mistyped or clash with resolved ones
    fn check_supplied(&self, supplied: &Args) -> Result<(), InjectError> {
        let overlap: Vec<String> = supplied
            .iter()
            .filter(|(name, _)| self.params.iter().any(|param| param.name == *name))
            .map(|(name, _)| name.to_string())
            .collect();
        if !overlap.is_empty() {
            return Err(InjectError::ArgumentOverlap {
                target: self.label,
                names: overlap,
            });
        }

        if let Some((name, _)) = supplied
            .iter()
            .find(|(name, _)| !self.supplied.iter().any(|(declared, _)| declared == name))
        {
            return Err(InjectError::UnexpectedArgument {
                target: self.label,
                name: name.to_string(),
            });
        }

        for (name, expected) in &self.supplied {
            let Some(instance) = supplied.instance(name) else {
                return Err(InjectError::ArgumentNotSupplied {
                    target: self.label,
                    name: name.clone(),
                });
            };
            if instance.info.type_id != expected.type_id {
                return Err(InjectError::MistypedArgument {
                    name: name.clone(),
                    expected: *expected,
                    actual: instance.info.type_name,
                });
            }
        }
        Ok(())
    }
}

impl<R> Clone for Invokable<R> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            params: self.params.clone(),
            supplied: self.supplied.clone(),
            call: self.call.clone(),
        }
    }
}

impl<R> Debug for Invokable<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invokable")
            .field("label", &self.label)
            .field("params", &self.params)
            .field("supplied", &self.supplied)
            .finish()
    }
}

/// Declares the parameters of an [`Invokable`], finished by `call` or `call_async`
pub struct InvokableBuilder {
    label: &'static str,
    params: Vec<Param>,
    supplied: Vec<(String, TypeInfo)>,
}

impl InvokableBuilder {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            params: Vec::new(),
            supplied: Vec::new(),
        }
    }

    /// A plain argument the caller passes to [`invoke_with`], not a dependency
    pub fn supplied<T: Injectable>(mut self, name: impl Into<String>) -> Self {
        self.supplied.push((name.into(), TypeInfo::of::<T>()));
        self
    }

    pub fn depends(mut self, name: impl Into<String>, dependency: Dependency) -> Self {
        self.params.push(Param::new(name, dependency));
        self
    }

    pub fn explicit(self, name: impl Into<String>, factory: &Factory) -> Self {
        self.depends(name, Dependency::explicit(factory))
    }

    pub fn implicit<T: Injectable>(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.depends(name.clone(), Dependency::implicit::<T>(name))
    }

    pub fn call<R, F>(self, call: F) -> Invokable<R>
    where
        R: Send + 'static,
        F: Fn(Args) -> R + Send + Sync + 'static,
    {
        self.call_async(move |args| {
            let result = call(args);
            async move { result }
        })
    }

    /// The target is itself asynchronous, invoking it awaits its result
    pub fn call_async<R, F, Fut>(self, call: F) -> Invokable<R>
    where
        R: Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
    {
        Invokable {
            label: self.label,
            params: self.params,
            supplied: self.supplied,
            call: Arc::new(move |args| call(args).boxed()),
        }
    }
}

/// Resolves every parameter of `target` against `ctx`, then calls it
///
/// Resolution failures are returned as they are, the target is not called then.
pub async fn invoke<R>(ctx: &Context, target: &Invokable<R>) -> Result<R, InjectError> {
    invoke_with(ctx, target, Args::new()).await
}

/// [`invoke`] for targets which also take caller supplied arguments
///
/// The supplied arguments are checked before anything is resolved. Names the target
/// resolves itself can't be supplied.
pub async fn invoke_with<R>(
    ctx: &Context,
    target: &Invokable<R>,
    supplied: Args,
) -> Result<R, InjectError> {
    ctx.ensure_open()?;
    target.check_supplied(&supplied)?;

    let mut stack = ResolutionStack::default();
    let mut args = resolve_params(ctx, ctx, &target.params, &mut stack).await?;
    args.extend(supplied);

    tracing::debug!("Invoking {} from {} scope", target.label, ctx.kind());
    Ok((target.call)(args).await)
}

impl Context {
    /// See [`invoke`]
    pub async fn invoke<R>(&self, target: &Invokable<R>) -> Result<R, InjectError> {
        invoke(self, target).await
    }

    /// See [`invoke_with`]
    pub async fn invoke_with<R>(&self, target: &Invokable<R>, supplied: Args) -> Result<R, InjectError> {
        invoke_with(self, target, supplied).await
    }
}
