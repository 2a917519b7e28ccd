use std::{
    any::{Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

/// Errors raised by user code (factories, resources, scope blocks)
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Scopes may be shared between concurrently running handlers,
/// so anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A resolved value, type-erased so it can live in a scope cache
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<T: Injectable>(instance: T) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub(crate) fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    /// Whether both handles point to the very same value
    pub fn same_as(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}
