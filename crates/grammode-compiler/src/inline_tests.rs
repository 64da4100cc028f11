use grammode_core::{MatchExpr, Span};

use super::*;
use crate::dce::remove_unreachable;

fn call(target: NodeId, return_to: NodeId) -> Effect {
    Effect::Call { target, return_to }
}

fn lit(value: &str) -> MatchExpr {
    MatchExpr::literal(value)
}

#[test]
fn tail_calls_become_jumps() {
    let mut graph = Graph::new();
    let start = graph.start();
    let outer = graph.add_node("outer", Span::default());
    let inner = graph.add_node("inner", Span::default());
    let end = graph.add_node("outer_end", Span::default());
    graph.add_edge(start, Edge::new(Some(outer), MatchExpr::Null, vec![call(outer, start)]));
    graph.add_edge(outer, Edge::new(Some(inner), lit("o"), vec![call(inner, end)]));
    graph.add_edge(inner, Edge::new(Some(inner), lit("i"), vec![]));
    graph.add_edge(inner, Edge::new(None, MatchExpr::Null, vec![Effect::Return]));
    graph.add_edge(end, Edge::new(None, MatchExpr::Null, vec![Effect::Return]));

    assert_eq!(remove_tail_calls(&mut graph), 1);

    insta::assert_snapshot!(graph.dump(), @r#"
    N0 START
        ε [call N1 ↩ N0] → N1
    N1 outer
        "o" → N2
    N2 inner
        "i" → N2
        ε [ret] → ∅
    N3 outer_end
        ε [ret] → ∅
    "#);
}

#[test]
fn return_with_context_pop_is_not_a_tail() {
    let mut graph = Graph::new();
    let start = graph.start();
    let callee = graph.add_node("callee", Span::default());
    let end = graph.add_node("end", Span::default());
    graph.add_edge(start, Edge::new(Some(callee), MatchExpr::Null, vec![call(callee, end)]));
    graph.add_edge(callee, Edge::new(None, lit("c"), vec![Effect::Return]));
    graph.add_edge(
        end,
        Edge::new(None, MatchExpr::Null, vec![Effect::PopContext, Effect::Return]),
    );

    assert_eq!(remove_tail_calls(&mut graph), 0);
}

#[test]
fn single_callers_get_a_private_copy() {
    let mut graph = Graph::new();
    let start = graph.start();
    let r = graph.add_node("r", Span::default());
    let lp = graph.add_node("r", Span::default());
    graph.add_edge(start, Edge::new(Some(r), lit("x"), vec![call(r, start)]));
    graph.add_edge(r, Edge::new(Some(lp), lit("a"), vec![]));
    graph.add_edge(lp, Edge::new(Some(lp), lit("b"), vec![]));
    graph.add_edge(
        lp,
        Edge::new(None, MatchExpr::Null, vec![Effect::PopContext, Effect::Return]),
    );

    assert!(inline_called_once(&mut graph));
    assert_eq!(remove_unreachable(&mut graph), 2);

    insta::assert_snapshot!(graph.dump(), @r#"
    N0 START
        "x" → N3
    N3 r_2
        "a" → N4
    N4 r_1_1
        "b" → N4
        ε [pop] → N0
    "#);
}

#[test]
fn shared_callees_stay_called() {
    let mut graph = Graph::new();
    let start = graph.start();
    let mid = graph.add_node("mid", Span::default());
    let r = graph.add_node("r", Span::default());
    graph.add_edge(start, Edge::new(Some(r), lit("x"), vec![call(r, mid)]));
    graph.add_edge(mid, Edge::new(Some(r), lit("y"), vec![call(r, start)]));
    graph.add_edge(r, Edge::new(None, lit("a"), vec![Effect::Return]));

    assert!(!inline_called_once(&mut graph));
}

#[test]
fn nested_calls_are_copied_as_calls() {
    let mut graph = Graph::new();
    let start = graph.start();
    let outer = graph.add_node("outer", Span::default());
    let back = graph.add_node("outer", Span::default());
    let leaf = graph.add_node("leaf", Span::default());
    graph.add_edge(start, Edge::new(Some(outer), lit("x"), vec![call(outer, start)]));
    graph.add_edge(outer, Edge::new(Some(leaf), MatchExpr::Null, vec![call(leaf, back)]));
    graph.add_edge(back, Edge::new(None, lit(";"), vec![Effect::Return]));
    graph.add_edge(leaf, Edge::new(None, lit("l"), vec![Effect::Return]));

    assert!(inline_called_once(&mut graph));
    remove_unreachable(&mut graph);

    insta::assert_snapshot!(graph.dump(), @r#"
    N0 START
        "x" → N4
    N3 leaf
        "l" [ret] → ∅
    N4 outer_2
        ε [call N3 ↩ N5] → N3
    N5 outer_1_1
        ";" → N0
    "#);
}
