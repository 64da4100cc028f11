//! Dead node elimination.
//!
//! Nodes become unreachable when splicing or inlining routes every
//! reference around them.

use std::collections::HashSet;

use grammode_core::{Graph, NodeId};

/// Kill nodes not reachable from START or TOKEN. Returns how many died.
///
/// Reachability follows destinations, call targets, return addresses, and
/// lookahead sub-graph entries.
pub fn remove_unreachable(graph: &mut Graph) -> usize {
    let reachable = compute_reachable(graph);
    let dead: Vec<NodeId> = graph
        .live_nodes()
        .filter(|id| !reachable.contains(id))
        .collect();
    for &id in &dead {
        graph.kill(id);
    }
    dead.len()
}

fn compute_reachable(graph: &Graph) -> HashSet<NodeId> {
    let mut reachable = HashSet::new();
    let mut queue: Vec<NodeId> = graph.entries().collect();

    while let Some(id) = queue.pop() {
        if !graph.is_live(id) || !reachable.insert(id) {
            continue;
        }
        for edge in graph.edges(id) {
            queue.extend(edge.successors());
            queue.extend(edge.calls().map(|(target, _)| target));
        }
    }

    reachable
}

#[cfg(test)]
mod tests {
    use grammode_core::{Edge, Effect, MatchExpr, Span};

    use super::*;

    #[test]
    fn removes_unreachable_nodes() {
        // START -> a, b orphaned
        let mut graph = Graph::new();
        let a = graph.add_node("a", Span::default());
        let b = graph.add_node("b", Span::default());
        graph.add_edge(graph.start(), Edge::new(Some(a), MatchExpr::literal("x"), vec![]));
        graph.add_edge(a, Edge::epsilon(graph.start()));
        graph.add_edge(b, Edge::epsilon(a));

        assert_eq!(remove_unreachable(&mut graph), 1);
        assert!(graph.is_live(a));
        assert!(!graph.is_live(b));
    }

    #[test]
    fn follows_calls_and_lookaheads() {
        let mut graph = Graph::new();
        let start = graph.start();
        let callee = graph.add_node("callee", Span::default());
        let back = graph.add_node("back", Span::default());
        let peek = graph.add_node("peek", Span::default());
        graph.add_edge(
            start,
            Edge::new(
                Some(callee),
                MatchExpr::Null,
                vec![Effect::Call {
                    target: callee,
                    return_to: back,
                }],
            ),
        );
        graph.add_edge(callee, Edge::new(None, MatchExpr::literal("c"), vec![Effect::Return]));
        graph.add_edge(
            back,
            Edge::new(
                Some(start),
                MatchExpr::Lookahead {
                    positive: false,
                    target: grammode_core::LookaheadTarget::Node(peek),
                },
                vec![],
            ),
        );
        graph.add_edge(peek, Edge::new(None, MatchExpr::Any, vec![Effect::Return]));

        assert_eq!(remove_unreachable(&mut graph), 0);
        assert_eq!(graph.live_count(), 4);
    }

    #[test]
    fn keeps_token_entry() {
        let mut graph = Graph::new();
        let token = graph.add_node("TOKEN", Span::default());
        graph.set_token(Some(token));
        graph.add_edge(graph.start(), Edge::epsilon(graph.start()));
        graph.add_edge(token, Edge::new(None, MatchExpr::Any, vec![Effect::Return]));

        assert_eq!(remove_unreachable(&mut graph), 0);
    }
}
