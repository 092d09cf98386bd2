//! Explicit strategy registry
//!
//! Maps a kind name (as used in JSON configs) to a factory building the
//! strategy from its [`StrategyConfig`].

use meridian_backtest::StrategyFactory;
use meridian_strategy::{BUILTIN_KINDS, Strategy, StrategyConfig, builtin};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SystemError};

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    factories: HashMap<String, Arc<StrategyFactory>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the bundled strategies
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in BUILTIN_KINDS {
            registry.register(kind, move |config: &StrategyConfig| builtin(kind, config));
        }
        registry
    }

    /// Register (or replace) the factory for `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&StrategyConfig) -> meridian_strategy::Result<Box<dyn Strategy>>
            + Send
            + Sync
            + 'static,
    {
        let kind = kind.into();
        if self.factories.insert(kind.clone(), Arc::new(factory)).is_some() {
            log::debug!("Replaced strategy factory '{}'", kind);
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn factory(&self, kind: &str) -> Result<Arc<StrategyFactory>> {
        self.factories
            .get(kind)
            .cloned()
            .ok_or_else(|| SystemError::UnknownKind(kind.to_string()))
    }

    /// Validate the config and build a strategy of `kind`
    pub fn build(&self, kind: &str, config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
        let factory = self.factory(kind)?;
        config.validate()?;
        Ok(factory(config)?)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
