use std::{fmt::Display, sync::Arc};

use thiserror::Error;

use crate::{
    factories::FactoryInfo,
    scope::ScopeKind,
    types::{DynError, TypeInfo},
};

/// Errors while resolving a dependency or invoking a target
///
/// Clone, so a single failure can be handed to every waiter of a shared resolution.
#[derive(Error, Debug, Clone)]
pub enum InjectError {
    /// The factory's scope is not reachable from the requesting context
    #[error("'{dependency}' is {scope} scoped and can't be resolved from a {context} context")]
    ScopeViolation {
        dependency: FactoryInfo,
        scope: ScopeKind,
        context: ScopeKind,
    },
    /// Resolution re-entered a factory that is still being resolved
    #[error("A circular dependency exists for '{dependency}' through {}", render_chain(.chain))]
    Cycle {
        dependency: FactoryInfo,
        chain: Vec<FactoryInfo>,
    },
    /// No implicit factory or bootstrap value is registered under the name
    #[error("Nothing named '{name}' is visible - register an implicit factory or a bootstrap value")]
    Unbound { name: String },
    /// The value found by name is not of the expected type
    #[error("'{name}' from {origin} is '{actual}' but '{expected}' was expected")]
    TypeMismatch {
        name: String,
        origin: ImplicitOrigin,
        expected: TypeInfo,
        actual: &'static str,
    },
    /// The requested wrapper depth can't be derived from what the factory produces
    #[error("Factory '{factory}' produces {produced} wrapper layer(s) but the dependency declares {requested}")]
    ShapeMismatch {
        factory: FactoryInfo,
        produced: usize,
        requested: usize,
    },
    /// The factory's value was already cached in the other form
    #[error("Factory '{factory}' was already resolved {} in this scope", render_form(.cached_unwrapped))]
    FormConflict {
        factory: FactoryInfo,
        cached_unwrapped: bool,
    },
    /// The factory, or entering its product, failed
    #[error("Factory '{factory}' failed - error: {error}")]
    FactoryFailed {
        factory: FactoryInfo,
        error: Arc<DynError>,
    },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// A factory asked its arguments for a parameter it never declared
    #[error("No argument named '{name}' was declared")]
    MissingArgument { name: String },
    /// Caller supplied arguments use names the target resolves itself
    #[error("'{target}' resolves {} itself, they can't be supplied", render_names(.names))]
    ArgumentOverlap {
        target: &'static str,
        names: Vec<String>,
    },
    #[error("'{target}' takes no supplied argument named '{name}'")]
    UnexpectedArgument { target: &'static str, name: String },
    #[error("'{target}' needs the argument '{name}' to be supplied")]
    ArgumentNotSupplied { target: &'static str, name: String },
    #[error("Supplied argument '{name}' is '{actual}' but '{expected}' was expected")]
    MistypedArgument {
        name: String,
        expected: TypeInfo,
        actual: &'static str,
    },
    #[error("App scoped factory '{factory}' can't be registered as '{name}' when entering a handler scope")]
    AppFactoryInHandlerScope { name: String, factory: FactoryInfo },
    /// The scope owning the operation has already exited
    #[error("The {0} scope was already closed")]
    ScopeClosed(ScopeKind),
    /// A concurrent resolution of the same factory was dropped before completing
    #[error("Resolution of '{0}' was abandoned before it completed")]
    Abandoned(FactoryInfo),
}

fn render_chain(chain: &[FactoryInfo]) -> String {
    chain
        .iter()
        .map(|info| format!("'{info}'"))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn render_names(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_form(unwrapped: &bool) -> &'static str {
    if *unwrapped {
        "unwrapped"
    } else {
        "raw"
    }
}

/// Where a by-name dependency came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitOrigin {
    ImplicitFactory,
    Bootstrap,
}
impl Display for ImplicitOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ImplicitOrigin::ImplicitFactory => "an implicit factory",
            ImplicitOrigin::Bootstrap => "a bootstrap value",
        })
    }
}

/// A single resource which failed to release
#[derive(Error, Debug)]
#[error("Releasing '{resource}' failed - error: {error}")]
pub struct ReleaseFailure {
    pub resource: &'static str,
    pub error: DynError,
}

/// All release failures of one scope exit
///
/// Every owned resource is released, even after earlier ones failed.
#[derive(Debug)]
pub struct ReleaseError {
    /// The failure which caused the scope to exit, if any
    pub cause: Option<DynError>,
    pub failures: Vec<ReleaseFailure>,
}
impl Display for ReleaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        match &self.cause {
            Some(cause) => display.push(format!(
                "Scope exited with '{cause}' and one or more resources failed to release:"
            )),
            None => display.push("One or more resources failed to release:".to_string()),
        }
        for failure in &self.failures {
            display.push(format!("- {}", failure));
        }
        f.write_str(&display.join("\n"))
    }
}
impl std::error::Error for ReleaseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Outcome of a failed [`crate::Context::with_next_scope`] block
#[derive(Error, Debug)]
pub enum ScopeFailure {
    /// The scope could not be entered
    #[error(transparent)]
    Enter(#[from] InjectError),
    /// The block failed, all resources were released
    #[error("Scope block failed - error: {0}")]
    Block(DynError),
    /// Releasing failed, the block's failure (if any) is kept as the cause
    #[error(transparent)]
    Release(#[from] ReleaseError),
}

impl ScopeFailure {
    /// The error which made the scope exit, ignoring release failures
    pub fn cause(&self) -> Option<&DynError> {
        match self {
            ScopeFailure::Enter(_) => None,
            ScopeFailure::Block(cause) => Some(cause),
            ScopeFailure::Release(release) => release.cause.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn release_error_lists_every_failure() {
        let error = ReleaseError {
            cause: Some("handler crashed".into()),
            failures: vec![
                ReleaseFailure {
                    resource: "Db",
                    error: "connection reset".into(),
                },
                ReleaseFailure {
                    resource: "Cache",
                    error: "timeout".into(),
                },
            ],
        };

        let rendered = error.to_string();
        assert!(rendered.contains("handler crashed"));
        assert!(rendered.contains("- Releasing 'Db' failed - error: connection reset"));
        assert!(rendered.contains("- Releasing 'Cache' failed - error: timeout"));
        assert_eq!(error.source().unwrap().to_string(), "handler crashed");
    }
}
