use std::sync::Arc;

use crate::{
    context::Context,
    errors::InjectError,
    factories::{Factory, FactoryInfo, Product},
    resources::{release_all, OwnedResource},
    types::{DynError, Instance},
};

/// Decides whether the product has to be entered/awaited for the requesting slot
///
/// The factory's wrapper depth minus the declared depth must be 0 (hand out as is)
/// or 1 (unwrap one layer).
pub(crate) fn needs_unwrap(
    factory: &Factory,
    info: FactoryInfo,
    requested: usize,
) -> Result<bool, InjectError> {
    let produced = factory.shape().depth();
    match produced.checked_sub(requested) {
        Some(0) => Ok(false),
        Some(1) => Ok(true),
        _ => Err(InjectError::ShapeMismatch {
            factory: info,
            produced,
            requested,
        }),
    }
}

/// Turns a factory product into the value stored in the owner's cache
///
/// Entered resources are handed to the owner, which releases them on exit.
pub(crate) async fn normalize(
    owner: &Context,
    info: FactoryInfo,
    product: Product,
    unwrap: bool,
) -> Result<Instance, InjectError> {
    if !unwrap {
        return Ok(product.into_raw());
    }

    match product {
        Product::Value(instance) => Ok(instance),
        Product::SyncManaged(resource) => {
            let instance = resource.enter().map_err(failed(info))?;
            adopt(owner, resource.into_owned(info.label)).await?;
            Ok(instance)
        }
        Product::Awaited(pending) => pending.wait().await.map_err(failed(info)),
        Product::AsyncManaged(resource) => {
            let instance = resource.enter().await.map_err(failed(info))?;
            adopt(owner, resource.into_owned(info.label)).await?;
            Ok(instance)
        }
    }
}

async fn adopt(owner: &Context, resource: OwnedResource) -> Result<(), InjectError> {
    let Err(resource) = owner.adopt(resource) else {
        return Ok(());
    };

    tracing::warn!(
        "{} scope closed while entering {} - releasing it right away",
        owner.kind(),
        resource.name()
    );
    release_all(vec![resource]).await;
    Err(InjectError::ScopeClosed(owner.kind()))
}

pub(crate) fn failed(factory: FactoryInfo) -> impl Fn(DynError) -> InjectError {
    move |error| InjectError::FactoryFailed {
        factory,
        error: Arc::new(error),
    }
}
