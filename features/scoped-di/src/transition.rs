use std::future::Future;

use crate::{
    context::Context,
    errors::{InjectError, ReleaseError, ReleaseFailure, ScopeFailure},
    registry::ImplicitFactories,
    resources::{release_all_blocking, OwnedResource, PendingRelease},
    scope::ScopeKind,
    types::DynError,
};

impl Context {
    /// Creates the child scope of this context
    ///
    /// Root enters App, App enters Handler and Handler enters a nested Handler.
    /// The returned guard owns the child: closing it releases every resource acquired
    /// in the child, last acquired first. Dropping it unclosed does the same, blocking.
    pub fn enter_next_scope(&self, implicit: ImplicitFactories) -> Result<ScopeGuard, InjectError> {
        self.ensure_open()?;

        let kind = self.kind().next();
        if kind == ScopeKind::Handler {
            let app_scoped = implicit
                .iter()
                .find(|(_, factory)| factory.scope() == ScopeKind::App);
            if let Some((name, factory)) = app_scoped {
                return Err(InjectError::AppFactoryInHandlerScope {
                    name: name.to_string(),
                    factory: factory.info(),
                });
            }
        }

        let context = self.new_child(implicit);
        tracing::debug!("Entered {} scope", kind);
        Ok(ScopeGuard {
            context,
            in_flight: None,
            closed: false,
        })
    }

    /// Runs `block` within the child scope and closes it afterwards, whether or not the block failed
    ///
    /// A failure of the block is kept as the cause if releasing fails too.
    pub async fn with_next_scope<R, E, F, Fut>(
        &self,
        implicit: ImplicitFactories,
        block: F,
    ) -> Result<R, ScopeFailure>
    where
        E: Into<DynError>,
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut guard = self.enter_next_scope(implicit)?;
        let outcome = block(guard.context().clone()).await;
        let failures = guard.release().await;

        match (outcome, failures.is_empty()) {
            (Ok(value), true) => Ok(value),
            (Ok(_), false) => Err(ScopeFailure::Release(ReleaseError {
                cause: None,
                failures,
            })),
            (Err(error), true) => Err(ScopeFailure::Block(error.into())),
            (Err(error), false) => Err(ScopeFailure::Release(ReleaseError {
                cause: Some(error.into()),
                failures,
            })),
        }
    }
}

/// An entered scope, released when closed or dropped
#[must_use = "dropping the guard exits the scope right away"]
pub struct ScopeGuard {
    context: Context,
    /// Release started but not yet finished, finished on drop if closing was cancelled
    in_flight: Option<PendingRelease>,
    closed: bool,
}

impl ScopeGuard {
    /// The context of the entered scope
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Exits the scope, releasing every owned resource even if some fail
    pub async fn close(mut self) -> Result<(), ReleaseError> {
        let failures = self.release().await;
        if failures.is_empty() {
            return Ok(());
        }
        Err(ReleaseError {
            cause: None,
            failures,
        })
    }

    /// Releases resources one at a time, so a cancelled close leaves the rest to `Drop`
    async fn release(&mut self) -> Vec<ReleaseFailure> {
        self.context.close();
        tracing::debug!(
            "Exiting {} scope, releasing {} resource(s)",
            self.context.kind(),
            self.context.owned_resources()
        );

        let mut failures = Vec::new();
        loop {
            if self.in_flight.is_none() {
                match self.context.take_last_resource() {
                    Some(resource) => self.in_flight = Some(resource.release()),
                    None => break,
                }
            }
            let Some(release) = self.in_flight.as_mut() else {
                break;
            };

            let outcome = release.await;
            self.in_flight = None;
            if let Err(failure) = outcome {
                tracing::error!("{failure}");
                failures.push(failure);
            }
        }

        self.closed = true;
        failures
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        self.context.close();
        let releases: Vec<PendingRelease> = self
            .in_flight
            .take()
            .into_iter()
            .chain(
                self.context
                    .take_resources()
                    .into_iter()
                    .map(OwnedResource::release),
            )
            .collect();
        tracing::warn!(
            "{} scope dropped without being closed, releasing {} resource(s) blocking",
            self.context.kind(),
            releases.len()
        );
        // Failures are logged while releasing, there's no caller left to return them to
        let _ = release_all_blocking(releases);
    }
}
