use std::{any::type_name, fmt::Display, sync::Arc};

use crate::{
    errors::InjectError,
    factories::Factory,
    types::{Injectable, Instance, TypeInfo},
};

/// How a dependency is found
#[derive(Debug, Clone)]
pub enum DependencyKey {
    /// Produced by one specific factory
    Explicit(Factory),
    /// Looked up by name in the implicit factories and bootstrap values, checked against the expected type
    Implicit { name: String, expected: TypeInfo },
}

/// A dependency slot of a factory or invoked target
#[derive(Debug, Clone)]
pub struct Dependency {
    key: DependencyKey,
    wrappers: usize,
}

impl Dependency {
    pub fn explicit(factory: &Factory) -> Self {
        Self {
            key: DependencyKey::Explicit(factory.clone()),
            wrappers: 0,
        }
    }

    pub fn implicit<T: Injectable>(name: impl Into<String>) -> Self {
        Self {
            key: DependencyKey::Implicit {
                name: name.into(),
                expected: TypeInfo::of::<T>(),
            },
            wrappers: 0,
        }
    }

    /// Requests the product with its wrapper kept - a resource unentered, a future as [`crate::Deferred`]
    pub fn raw(self) -> Self {
        self.wrapped(1)
    }

    /// Declares how many wrapper layers the slot expects around the value
    pub fn wrapped(mut self, layers: usize) -> Self {
        self.wrappers = layers;
        self
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn wrappers(&self) -> usize {
        self.wrappers
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            DependencyKey::Explicit(factory) => write!(f, "{}", factory.info()),
            DependencyKey::Implicit { name, expected } => write!(f, "{name}: {expected}"),
        }
    }
}

/// A named parameter of a factory or target
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub dependency: Dependency,
}
impl Param {
    pub fn new(name: impl Into<String>, dependency: Dependency) -> Self {
        Self {
            name: name.into(),
            dependency,
        }
    }
}

/// Resolved parameters, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(String, Instance)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a caller supplied argument, replacing one of the same name
    pub fn with<T: Injectable>(mut self, name: impl Into<String>, value: T) -> Self {
        let name = name.into();
        self.values.retain(|(existing, _)| *existing != name);
        self.values.push((name, Instance::new(value)));
        self
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, name: String, instance: Instance) {
        self.values.push((name, instance));
    }

    pub(crate) fn extend(&mut self, other: Args) {
        self.values.extend(other.values);
    }

    /// Gets a resolved parameter by name
    pub fn get<T: Injectable>(&self, name: &str) -> Result<Arc<T>, InjectError> {
        let instance = self
            .instance(name)
            .ok_or_else(|| InjectError::MissingArgument {
                name: name.to_string(),
            })?;

        instance
            .downcast()
            .map_err(|actual_type| InjectError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.values
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, instance)| instance)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.values
            .iter()
            .map(|(name, instance)| (name.as_str(), instance))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
