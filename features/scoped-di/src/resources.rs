use futures::{executor::block_on, future::BoxFuture, FutureExt};

use crate::{errors::ReleaseFailure, types::DynError};

type BlockingRelease = Box<dyn FnOnce() -> Result<(), DynError> + Send>;
type SuspendingRelease = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), DynError>> + Send>;

/// A started (or about to start) release of one resource
pub(crate) type PendingRelease = BoxFuture<'static, Result<(), ReleaseFailure>>;

enum Release {
    Blocking(BlockingRelease),
    Suspending(SuspendingRelease),
}

/// An entered resource, owned by a scope until the scope exits
pub(crate) struct OwnedResource {
    name: &'static str,
    release: Release,
}

impl OwnedResource {
    pub(crate) fn blocking(
        name: &'static str,
        release: impl FnOnce() -> Result<(), DynError> + Send + 'static,
    ) -> Self {
        Self {
            name,
            release: Release::Blocking(Box::new(release)),
        }
    }

    pub(crate) fn suspending(
        name: &'static str,
        release: impl FnOnce() -> BoxFuture<'static, Result<(), DynError>> + Send + 'static,
    ) -> Self {
        Self {
            name,
            release: Release::Suspending(Box::new(release)),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// The release of this resource, running once polled
    pub(crate) fn release(self) -> PendingRelease {
        async move {
            tracing::debug!("Releasing {}", self.name);
            let result = match self.release {
                Release::Blocking(release) => release(),
                Release::Suspending(release) => release().await,
            };
            result.map_err(|error| ReleaseFailure {
                resource: self.name,
                error,
            })
        }
        .boxed()
    }
}

/// Resources of one scope, in acquisition order
#[derive(Default)]
pub(crate) struct ResourceStack {
    entries: Vec<OwnedResource>,
}

impl ResourceStack {
    pub(crate) fn push(&mut self, resource: OwnedResource) {
        self.entries.push(resource);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// The last acquired resource
    pub(crate) fn pop(&mut self) -> Option<OwnedResource> {
        self.entries.pop()
    }

    /// Takes every resource out, last acquired first
    pub(crate) fn take_lifo(&mut self) -> Vec<OwnedResource> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.reverse();
        entries
    }
}

/// Releases every resource in the given order, continuing after failures
pub(crate) async fn release_all(resources: Vec<OwnedResource>) -> Vec<ReleaseFailure> {
    run_releases(resources.into_iter().map(OwnedResource::release).collect()).await
}

async fn run_releases(releases: Vec<PendingRelease>) -> Vec<ReleaseFailure> {
    let mut failures = Vec::new();
    for release in releases {
        if let Err(failure) = release.await {
            tracing::error!("{failure}");
            failures.push(failure);
        }
    }
    failures
}

/// Finishes the given releases for places which can't suspend, like `Drop`
///
/// Drives the releases on a thread of its own, so it may be called from within an executor.
pub(crate) fn release_all_blocking(releases: Vec<PendingRelease>) -> Vec<ReleaseFailure> {
    let releasing = std::thread::spawn(move || block_on(run_releases(releases)));
    match releasing.join() {
        Ok(failures) => failures,
        Err(_) => {
            tracing::error!("Releasing resources panicked");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorded(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, fail: bool) -> OwnedResource {
        let log = log.clone();
        OwnedResource::suspending(name, move || {
            async move {
                log.lock().unwrap().push(name);
                let result: Result<(), DynError> = match fail {
                    true => Err(format!("{name} broke").into()),
                    false => Ok(()),
                };
                result
            }
            .boxed()
        })
    }

    #[test]
    fn releases_last_acquired_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ResourceStack::default();
        stack.push(recorded(&log, "a", false));
        stack.push(recorded(&log, "b", false));
        stack.push(recorded(&log, "c", false));

        let failures = block_on(release_all(stack.take_lifo()));

        assert!(failures.is_empty());
        assert_eq!(*log.lock().unwrap(), ["c", "b", "a"]);
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn keeps_releasing_after_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = ResourceStack::default();
        stack.push(recorded(&log, "a", true));
        stack.push(OwnedResource::blocking("b", || Ok(())));
        stack.push(recorded(&log, "c", true));

        let releases = stack.take_lifo().into_iter().map(OwnedResource::release).collect();
        let failures = release_all_blocking(releases);

        assert_eq!(*log.lock().unwrap(), ["c", "a"]);
        let failed: Vec<_> = failures.iter().map(|failure| failure.resource).collect();
        assert_eq!(failed, ["c", "a"]);
        assert_eq!(failures[0].error.to_string(), "c broke");
    }
}
