//! Call elimination.
//!
//! Two rewrites that remove `Call` effects the local passes cannot:
//! tail calls, whose return address only returns again, and rules entered
//! through exactly one call in the whole graph, whose body is copied to the
//! call site.

use std::collections::{HashMap, VecDeque};

use grammode_core::{Edge, Effect, Graph, NodeId};

use crate::simplify::incoming_counts;

#[cfg(test)]
#[path = "inline_tests.rs"]
mod inline_tests;

/// Drops calls whose return address is a bare return.
///
/// The callee then returns straight to the caller's own return address.
/// Returns how many call effects were removed.
pub fn remove_tail_calls(graph: &mut Graph) -> usize {
    let nodes: Vec<NodeId> = graph.live_nodes().collect();
    let bare: Vec<bool> = (0..graph.len() as NodeId)
        .map(|id| graph.is_live(id) && is_bare_return(graph.edges(id)))
        .collect();

    let mut removed = 0;
    for node in nodes {
        for edge in &mut graph.node_mut(node).edges {
            let before = edge.effects.len();
            edge.effects.retain(|effect| match effect {
                Effect::Call { return_to, .. } => !bare[*return_to as usize],
                _ => true,
            });
            removed += before - edge.effects.len();
        }
    }
    removed
}

fn is_bare_return(edges: &[Edge]) -> bool {
    matches!(edges, [edge] if edge.to.is_none()
        && edge.matcher.is_null()
        && edge.effects == [Effect::Return])
}

/// Inlines one rule that a single call edge enters.
///
/// The callee's body is copied, its returns rewired to the call's return
/// address, and the call effect dropped. The original body becomes
/// unreachable and is left for collection. Returns whether a call was inlined.
pub fn inline_called_once(graph: &mut Graph) -> bool {
    let incoming = incoming_counts(graph);
    let mut call_counts: HashMap<NodeId, usize> = HashMap::new();
    for id in graph.live_nodes() {
        for edge in graph.edges(id) {
            for (target, _) in edge.calls() {
                *call_counts.entry(target).or_default() += 1;
            }
        }
    }

    let candidate = graph.live_nodes().find_map(|node| {
        graph.edges(node).iter().enumerate().find_map(|(i, edge)| {
            let (target, return_to) = single_call(edge)?;
            let eligible = edge.to == Some(target)
                && !graph.is_entry(target)
                && call_counts.get(&target) == Some(&1)
                && incoming[target as usize] == 1;
            if !eligible {
                return None;
            }
            let region = callee_region(graph, target, node)?;
            Some((node, i, return_to, region))
        })
    });
    let Some((node, i, return_to, region)) = candidate else {
        return false;
    };

    let copies: HashMap<NodeId, NodeId> = region
        .iter()
        .map(|&id| {
            let source = graph.node(id);
            let (label, span) = (source.label.clone(), source.span);
            (id, graph.add_node(&label, span))
        })
        .collect();
    let remap = |id: NodeId| copies.get(&id).copied().unwrap_or(id);

    for &id in &region {
        let mut edges = graph.edges(id).to_vec();
        for edge in &mut edges {
            if let Some(to) = edge.to.as_mut() {
                *to = remap(*to);
            }
            for effect in &mut edge.effects {
                if let Effect::Call { return_to, .. } = effect {
                    *return_to = remap(*return_to);
                }
            }
            if edge.to.is_none() {
                if let Some(pos) = edge.effects.iter().rposition(|e| *e == Effect::Return) {
                    edge.effects.remove(pos);
                }
                edge.to = Some(return_to);
            }
        }
        graph.node_mut(copies[&id]).edges = edges;
    }

    let call_edge = &mut graph.node_mut(node).edges[i];
    call_edge
        .effects
        .retain(|effect| !matches!(effect, Effect::Call { .. }));
    call_edge.to = call_edge.to.map(remap);
    true
}

fn single_call(edge: &Edge) -> Option<(NodeId, NodeId)> {
    let mut calls = edge.calls();
    let call = calls.next()?;
    calls.next().is_none().then_some(call)
}

/// Nodes the callee runs through before returning, `target` first.
///
/// Nested calls are followed to their return address only, since their
/// bodies return on their own. `None` when the region reaches an entry or
/// the caller, or holds an edge the rewiring cannot handle.
fn callee_region(graph: &Graph, target: NodeId, caller: NodeId) -> Option<Vec<NodeId>> {
    let mut region = vec![target];
    let mut queue = VecDeque::from([target]);
    while let Some(id) = queue.pop_front() {
        if graph.is_entry(id) || id == caller {
            return None;
        }
        for edge in graph.edges(id) {
            let mut calls = edge.calls();
            let next = match (calls.next(), calls.next()) {
                (None, _) => edge.to,
                (Some(_), Some(_)) => return None,
                (Some(_), None) if edge.to.is_none() => return None,
                (Some((_, return_to)), None) => Some(return_to),
            };
            if let Some(next) = next
                && !region.contains(&next)
            {
                region.push(next);
                queue.push_back(next);
            }
        }
    }
    Some(region)
}
