use std::collections::HashMap;

use crate::{
    context::{Context, RootState},
    factories::{Factory, FactoryId},
    types::{Injectable, Instance},
};

/// Collects everything the root context is created with.
///
/// 1. Bootstrap values: ready-made values, found by name from any scope
/// 2. Overrides: replacement factories, looked up by the identity of the factory they replace.
///    Meant for tests, the replacement's product type is not checked.
///
/// Both are frozen once the root context is built.
pub struct RootBuilder {
    /// Registered bootstrap values
    pub(crate) bootstrap: HashMap<String, Instance>,
    /// Registered replacement factories
    pub(crate) overrides: HashMap<FactoryId, Factory>,
}
impl Default for RootBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RootBuilder {
    pub fn new() -> Self {
        RootBuilder {
            bootstrap: HashMap::new(),
            overrides: HashMap::new(),
        }
    }
}
impl RootBuilder {
    pub fn add_bootstrap<T: Injectable>(mut self, name: impl Into<String>, value: T) -> Self {
        self.bootstrap.insert(name.into(), Instance::new(value));
        self
    }

    /// Resolves `replacement` wherever `original` would be resolved
    pub fn add_override(mut self, original: &Factory, replacement: Factory) -> Self {
        self.overrides.insert(original.id(), replacement);
        self
    }

    pub fn build(self) -> Context {
        tracing::debug!(
            "Creating root context with {} bootstrap values and {} overrides",
            self.bootstrap.len(),
            self.overrides.len()
        );

        Context::new_root(RootState {
            overrides: self.overrides,
            bootstrap: self.bootstrap,
        })
    }
}
