use crate::{errors::InjectError, factories::FactoryInfo};

/// Factories currently being resolved by one top level resolution, outermost first
#[derive(Debug, Default)]
pub(crate) struct ResolutionStack {
    chain: Vec<FactoryInfo>,
}

impl ResolutionStack {
    /// Fails if the factory is already being resolved further up the chain
    pub(crate) fn check(&self, info: FactoryInfo) -> Result<(), InjectError> {
        let Some(start) = self.chain.iter().position(|entry| entry.id == info.id) else {
            return Ok(());
        };

        let mut chain = self.chain[start..].to_vec();
        chain.push(info); // Close the loop so the trace reads start to start
        Err(InjectError::Cycle {
            dependency: info,
            chain,
        })
    }

    pub(crate) fn push(&mut self, info: FactoryInfo) {
        self.chain.push(info);
    }

    pub(crate) fn pop(&mut self) {
        self.chain.pop();
    }

    pub(crate) fn depth(&self) -> usize {
        self.chain.len()
    }
}
