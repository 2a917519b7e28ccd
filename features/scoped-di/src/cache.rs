use std::collections::HashMap;

use futures_channel::oneshot;

use crate::{errors::InjectError, factories::FactoryId, types::Instance};

pub(crate) type CacheResponseSender = oneshot::Sender<Result<Cached, InjectError>>;
pub(crate) type CacheResponseReceiver = oneshot::Receiver<Result<Cached, InjectError>>;

/// A cached factory product
#[derive(Debug, Clone)]
pub(crate) struct Cached {
    pub instance: Instance,
    /// Whether the product was entered/awaited before caching, or kept raw
    pub unwrapped: bool,
}

enum Slot {
    Ready(Cached),
    /// Someone is producing the value - waiters get informed once it is done
    Pending(Vec<CacheResponseSender>),
}

pub(crate) enum Lookup {
    Ready(Cached),
    /// Another resolution is producing the value
    Wait(CacheResponseReceiver),
    /// The caller has to produce the value, then fulfil or abandon the slot
    Claimed,
}

/// Values of one scope, at most one per factory
#[derive(Default)]
pub(crate) struct ScopeCache {
    slots: HashMap<FactoryId, Slot>,
}

impl ScopeCache {
    pub(crate) fn lookup_or_claim(&mut self, id: FactoryId) -> Lookup {
        match self.slots.get_mut(&id) {
            Some(Slot::Ready(cached)) => Lookup::Ready(cached.clone()),
            Some(Slot::Pending(waiters)) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Lookup::Wait(rx)
            }
            None => {
                self.slots.insert(id, Slot::Pending(Vec::new()));
                Lookup::Claimed
            }
        }
    }

    /// Stores the product of a claimed slot and informs all waiters
    ///
    /// Ready values are never overwritten.
    pub(crate) fn fulfil(&mut self, id: FactoryId, cached: Cached) {
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        if let Slot::Ready(_) = slot {
            tracing::warn!("Tried to overwrite cached value of {:?}", id);
            return;
        }

        if let Slot::Pending(waiters) = std::mem::replace(slot, Slot::Ready(cached.clone())) {
            for waiter in waiters {
                // Error only means the waiter was dropped
                let _ = waiter.send(Ok(cached.clone()));
            }
        }
    }

    /// Frees a claimed slot without a value
    ///
    /// Waiters get the error, or a canceled channel if there is none.
    pub(crate) fn abandon(&mut self, id: FactoryId, error: Option<&InjectError>) {
        if !matches!(self.slots.get(&id), Some(Slot::Pending(_))) {
            return;
        }

        if let Some(Slot::Pending(waiters)) = self.slots.remove(&id) {
            let Some(error) = error else {
                return;
            };
            for waiter in waiters {
                let _ = waiter.send(Err(error.clone()));
            }
        }
    }

    /// Number of ready values
    pub(crate) fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }
}
