//! Executor identity registry.
//!
//! Every executor variant declares a (TYPE, VERSION) pair; the registry
//! rejects duplicates so a stale cache entry can never be read back under
//! the wrong variant's identity.

use std::collections::HashSet;

use vqe_models::ExecutorId;

use crate::error::{EngineError, EngineResult};

/// Startup-validated set of executor identities.
#[derive(Debug, Default)]
pub struct ExecutorRegistry {
    entries: HashSet<ExecutorId>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in executor variant.
    ///
    /// Construction fails if two built-ins ever end up sharing an identity.
    pub fn builtin() -> EngineResult<Self> {
        let mut registry = Self::new();
        for id in crate::builtin_executor_ids() {
            registry.register(id)?;
        }
        Ok(registry)
    }

    /// Register an executor identity, rejecting duplicates of
    /// (TYPE, VERSION).
    pub fn register(&mut self, id: ExecutorId) -> EngineResult<()> {
        if !self.entries.insert(id) {
            return Err(EngineError::DuplicateExecutor(id.key()));
        }
        Ok(())
    }

    pub fn contains(&self, id: &ExecutorId) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
