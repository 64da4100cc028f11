//! Per-line matcher state kept by the host.

use std::rc::Rc;

use grammode_core::NodeId;

use super::context::Context;
use super::program::Action;

/// Control stack plus the innermost open context.
///
/// The top of `stack` is where matching resumes; the entries below it are
/// return addresses. Cloning is cheap: the context chain is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub(crate) stack: Vec<NodeId>,
    pub(crate) context: Option<Rc<Context>>,
}

impl State {
    pub(crate) fn new(entry: NodeId) -> Self {
        Self {
            stack: vec![entry],
            context: None,
        }
    }

    pub fn stack(&self) -> &[NodeId] {
        &self.stack
    }

    /// Innermost open context.
    pub fn context(&self) -> Option<&Context> {
        self.context.as_deref()
    }

    /// Open contexts, innermost first.
    pub fn contexts(&self) -> Contexts<'_> {
        Contexts {
            next: self.context(),
        }
    }

    /// Applies `action`; a pushed scope records `at` as its start offset.
    pub(crate) fn apply(&mut self, action: &Action, at: usize) {
        match action {
            Action::Call { target, return_to } => {
                if let Some(top) = self.stack.last_mut() {
                    *top = *return_to;
                }
                self.stack.push(*target);
            }
            Action::Push { name, style } => {
                self.context = Some(Rc::new(Context {
                    name: name.clone(),
                    style: style.clone(),
                    depth: self.stack.len(),
                    start: at,
                    parent: self.context.take(),
                }));
            }
            Action::Pop => {
                if let Some(context) = self.context.take() {
                    self.context = context.parent.clone();
                }
            }
        }
    }

    /// Moves to `to`, or returns to the caller when `to` is `None`.
    pub(crate) fn go(&mut self, to: Option<NodeId>) {
        match to {
            Some(to) => match self.stack.last_mut() {
                Some(top) => *top = to,
                None => self.stack.push(to),
            },
            None => {
                self.stack.pop();
                self.drop_stale_contexts();
            }
        }
    }

    fn drop_stale_contexts(&mut self) {
        while let Some(context) = &self.context
            && context.depth > self.stack.len()
        {
            self.context = context.parent.clone();
        }
    }
}

/// Space-joined styles of `context` and its parents, outermost first,
/// followed by `token`.
pub(crate) fn compose_style(context: Option<&Context>, token: Option<&str>) -> Option<String> {
    let chain = Contexts { next: context };
    let mut styles: Vec<&str> = chain.filter_map(Context::style).collect();
    styles.reverse();
    styles.extend(token);
    if styles.is_empty() {
        None
    } else {
        Some(styles.join(" "))
    }
}

/// True if `context` is `chain` or one of its ancestors.
pub(crate) fn chain_contains(chain: Option<&Rc<Context>>, context: &Rc<Context>) -> bool {
    let mut cur = chain;
    while let Some(cx) = cur {
        if Rc::ptr_eq(cx, context) {
            return true;
        }
        cur = cx.parent.as_ref();
    }
    false
}

/// Iterator over a context chain, innermost first.
pub struct Contexts<'s> {
    next: Option<&'s Context>,
}

impl<'s> Iterator for Contexts<'s> {
    type Item = &'s Context;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.parent();
        Some(cur)
    }
}
