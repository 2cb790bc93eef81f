//! A closed, compile-time registry of drain constructors.
//!
//! Unlike a plugin loader, the set of drain kinds is fixed: `tcp`, `udp`,
//! `redis` and `file`. Adding a new kind means adding a match arm and
//! recompiling, which is the trade-off the design notes call for in exchange
//! for never needing to trust dynamically loaded code.

use crate::drain::DrainFactory;
use crate::error::{LogyardError, Result};
use crate::types::DrainKind;
use std::collections::HashMap;

pub struct DrainRegistry {
    factories: HashMap<DrainKind, DrainFactory>,
}

impl DrainRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, kind: DrainKind, factory: DrainFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn construct(&self, kind: DrainKind) -> Result<Box<dyn crate::drain::Drain>> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| LogyardError::Configuration(format!("no drain registered for {}", kind.as_str())))?;
        Ok(factory())
    }

    #[must_use]
    pub fn contains(&self, kind: DrainKind) -> bool {
        self.factories.contains_key(&kind)
    }
}

impl Default for DrainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drain::Drain;
    use crate::error::Result as LResult;
    use crate::types::{DrainConfig, Message};
    use async_trait::async_trait;
    use tokio::sync::mpsc::Receiver;

    struct NoopDrain;

    #[async_trait]
    impl Drain for NoopDrain {
        fn start(&mut self, _config: DrainConfig, _inbox: Receiver<Message>) {}
        async fn stop(&mut self) -> LResult<()> {
            Ok(())
        }
        async fn wait(&mut self) -> LResult<()> {
            Ok(())
        }
    }

    #[test]
    fn unregistered_kind_is_a_configuration_error() {
        let registry = DrainRegistry::new();
        let result = registry.construct(DrainKind::Tcp);
        assert!(matches!(result, Err(LogyardError::Configuration(_))));
    }

    #[test]
    fn registered_kind_constructs() {
        let mut registry = DrainRegistry::new();
        registry.register(DrainKind::Tcp, std::sync::Arc::new(|| Box::new(NoopDrain) as Box<dyn Drain>));
        assert!(registry.contains(DrainKind::Tcp));
        assert!(registry.construct(DrainKind::Tcp).is_ok());
    }
}
