//! Nested lexical scopes.
//!
//! Contexts form a persistent linked stack: a state copy shares its whole
//! chain with the original, and popping only moves the state's pointer to
//! the parent.

use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub(crate) name: Arc<str>,
    pub(crate) style: Option<Arc<str>>,
    /// Control stack length when the scope was opened. The scope is stale
    /// once the stack unwinds below it.
    pub(crate) depth: usize,
    /// Byte offset in the line where the scope opened.
    pub(crate) start: usize,
    pub(crate) parent: Option<Rc<Context>>,
}

impl Context {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Byte offset in the opening line, e.g. for aligning continuation lines.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn parent(&self) -> Option<&Context> {
        self.parent.as_deref()
    }
}
