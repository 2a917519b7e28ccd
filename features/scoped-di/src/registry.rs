use std::collections::HashMap;

use crate::factories::Factory;

/// Factories found by name, handed to a scope transition
///
/// Visible in the entered scope and every scope nested into it, shadowing
/// same-named entries of enclosing scopes.
#[derive(Debug, Clone, Default)]
pub struct ImplicitFactories {
    factories: HashMap<String, Factory>,
}

impl ImplicitFactories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, factory: Factory) -> Self {
        self.insert(name, factory);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, factory: Factory) -> Option<Factory> {
        self.factories.insert(name.into(), factory)
    }

    pub fn get(&self, name: &str) -> Option<&Factory> {
        self.factories.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Factory)> {
        self.factories
            .iter()
            .map(|(name, factory)| (name.as_str(), factory))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
