//! Host-provided zero-width tests.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::Context;

/// Called with the full line, the byte offset being tested, and the innermost
/// context.
pub type PredicateFn = Arc<dyn Fn(&str, usize, Option<&Context>) -> bool + Send + Sync>;

/// Named predicate callbacks, resolved once when a program is loaded.
#[derive(Clone, Default)]
pub struct Predicates {
    map: IndexMap<String, PredicateFn>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `name`, replacing any earlier callback.
    pub fn with(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&str, usize, Option<&Context>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.insert(name, f);
        self
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&str, usize, Option<&Context>) -> bool + Send + Sync + 'static,
    ) {
        self.map.insert(name.into(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&PredicateFn> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Predicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}
