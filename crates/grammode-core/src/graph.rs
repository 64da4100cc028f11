//! The pushdown automaton graph.
//!
//! Nodes live in an arena addressed by `NodeId` and are never freed: passes
//! that drop a node move it to the dead set, and every lookup helper skips
//! dead nodes. Edge order is significant: the runtime tries a node's edges
//! first to last and commits to the first that consumes input.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{GraphPrinter, MatchExpr, Span};

#[cfg(test)]
#[path = "graph_tests.rs"]
mod graph_tests;

/// Index into `Graph::nodes`.
pub type NodeId = u32;

/// Side effect applied when an edge is taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Invoke the rule entered at `target`, resuming at `return_to` once it returns.
    Call { target: NodeId, return_to: NodeId },
    /// Open a lexical scope. `style` is prefixed onto tokens reported inside it.
    PushContext { name: String, style: Option<String> },
    PopContext,
    /// Fall back to the caller. Always paired with a `None` destination.
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub matcher: MatchExpr,
    pub effects: Vec<Effect>,
    /// `None` pops the control stack and resumes at the recorded return address.
    pub to: Option<NodeId>,
}

impl Edge {
    pub fn new(to: Option<NodeId>, matcher: MatchExpr, effects: Vec<Effect>) -> Self {
        Self {
            matcher,
            effects,
            to,
        }
    }

    pub fn epsilon(to: NodeId) -> Self {
        Self::new(Some(to), MatchExpr::Null, Vec::new())
    }

    pub fn is_return(&self) -> bool {
        self.to.is_none()
    }

    pub fn has_call(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, Effect::Call { .. }))
    }

    pub fn has_push(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, Effect::PushContext { .. }))
    }

    pub fn has_pop(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, Effect::PopContext))
    }

    /// `(target, return_to)` of every call effect, in order.
    pub fn calls(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.effects.iter().filter_map(|e| match e {
            Effect::Call { target, return_to } => Some((*target, *return_to)),
            _ => None,
        })
    }

    /// Nodes the runtime can reach through this edge: the destination, pushed
    /// return addresses, and lookahead sub-graph entries.
    pub fn successors(&self) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.to.into_iter().collect();
        for (_, return_to) in self.calls() {
            out.push(return_to);
        }
        self.matcher.visit_nodes(&mut |id| out.push(id));
        out
    }

    /// Rewrites every node reference, call targets included.
    pub fn remap(&mut self, f: &impl Fn(NodeId) -> NodeId) {
        if let Some(to) = self.to.as_mut() {
            *to = f(*to);
        }
        for effect in &mut self.effects {
            if let Effect::Call { target, return_to } = effect {
                *target = f(*target);
                *return_to = f(*return_to);
            }
        }
        self.matcher.remap_nodes(f);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    /// Grammar source of the rule this node was built for.
    pub span: Span,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
    dead: BTreeSet<NodeId>,
    start: NodeId,
    token: Option<NodeId>,
    #[serde(skip)]
    label_counts: HashMap<String, u32>,
}

/// Label counters only affect naming of future nodes, so they are not compared.
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.dead == other.dead
            && self.start == other.start
            && self.token == other.token
    }
}

impl Eq for Graph {}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates a graph holding only the START entry.
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            dead: BTreeSet::new(),
            start: 0,
            token: None,
            label_counts: HashMap::new(),
        };
        graph.start = graph.add_node("START", Span::default());
        graph
    }

    /// Adds a node labeled `base`, suffixed with a counter when the label is taken.
    pub fn add_node(&mut self, base: &str, span: Span) -> NodeId {
        let mut count = self.label_counts.get(base).copied().unwrap_or(0);
        let label = loop {
            let candidate = if count == 0 {
                base.to_string()
            } else {
                format!("{}_{}", base, count)
            };
            count += 1;
            if !self.label_counts.contains_key(&candidate) {
                break candidate;
            }
        };
        self.label_counts.insert(base.to_string(), count);
        self.label_counts.entry(label.clone()).or_insert(1);

        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node {
            label,
            span,
            edges: Vec::new(),
        });
        id
    }

    pub fn add_edge(&mut self, from: NodeId, edge: Edge) {
        self.nodes[from as usize].edges.push(edge);
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn token(&self) -> Option<NodeId> {
        self.token
    }

    pub fn set_token(&mut self, token: Option<NodeId>) {
        self.token = token;
    }

    pub fn entries(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.start).chain(self.token)
    }

    pub fn is_entry(&self, id: NodeId) -> bool {
        id == self.start || self.token == Some(id)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if self.dead.contains(&id) {
            return None;
        }
        self.nodes.get(id as usize)
    }

    pub fn edges(&self, id: NodeId) -> &[Edge] {
        &self.nodes[id as usize].edges
    }

    /// Size of the arena, dead nodes included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        (id as usize) < self.nodes.len() && !self.dead.contains(&id)
    }

    /// Live node ids in ascending order.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as NodeId).filter(|id| !self.dead.contains(id))
    }

    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.dead.len()
    }

    pub fn edge_count(&self) -> usize {
        self.live_nodes().map(|id| self.edges(id).len()).sum()
    }

    pub fn kill(&mut self, id: NodeId) {
        self.dead.insert(id);
    }

    /// Points every reference to `from` at `to`, entries included.
    pub fn redirect(&mut self, from: NodeId, to: NodeId) {
        let f = |id: NodeId| if id == from { to } else { id };
        for id in 0..self.nodes.len() {
            if self.dead.contains(&(id as NodeId)) {
                continue;
            }
            for edge in &mut self.nodes[id].edges {
                edge.remap(&f);
            }
        }
        self.start = f(self.start);
        self.token = self.token.map(f);
    }

    pub fn printer(&self) -> GraphPrinter<'_> {
        GraphPrinter::new(self)
    }

    pub fn dump(&self) -> String {
        self.printer().dump()
    }
}
