//! Tests for the graph arena and its dump.

use super::*;
use crate::RepeatKind;

fn sample() -> Graph {
    let mut g = Graph::new();
    let body = g.add_node("num", Span::new(0, 3));
    let ret = g.add_node("num", Span::new(0, 3));

    g.add_edge(
        g.start(),
        Edge::new(
            Some(body),
            MatchExpr::Null,
            vec![Effect::Call {
                target: body,
                return_to: 0,
            }],
        ),
    );
    g.add_edge(
        body,
        Edge::new(
            None,
            MatchExpr::repeat(RepeatKind::OneOrMore, MatchExpr::range('0', '9')),
            vec![
                Effect::PushContext {
                    name: "num".into(),
                    style: Some("number".into()),
                },
                Effect::PopContext,
                Effect::Return,
            ],
        ),
    );
    g.add_edge(ret, Edge::epsilon(body));
    g
}

#[test]
fn labels_get_counters() {
    let g = sample();

    assert_eq!(g.node(1).label, "num");
    assert_eq!(g.node(2).label, "num_1");
}

#[test]
fn derived_labels_never_collide() {
    let mut g = Graph::new();
    let a = g.add_node("r", Span::default());
    let b = g.add_node("r", Span::default());
    let c = g.add_node("r_1", Span::default());
    let d = g.add_node("r", Span::default());

    let labels: Vec<&str> = [a, b, c, d]
        .iter()
        .map(|&id| g.node(id).label.as_str())
        .collect();
    assert_eq!(labels, ["r", "r_1", "r_1_1", "r_2"]);
}

#[test]
fn dump_live_nodes() {
    let mut g = sample();
    g.kill(2);

    insta::assert_snapshot!(g.dump(), @r"
    N0 START
        ε [call N1 ↩ N0] → N1
    N1 num
        '0'-'9'+ [push num:number, pop, ret] → ∅
    ");
}

#[test]
fn dump_with_dead_nodes() {
    let mut g = sample();
    g.kill(2);

    insta::assert_snapshot!(g.printer().show_dead(true).dump(), @r"
    N0 START
        ε [call N1 ↩ N0] → N1
    N1 num
        '0'-'9'+ [push num:number, pop, ret] → ∅
    N2 ✗ num_1
        ε → N1
    ");
}

#[test]
fn redirect_rewrites_every_reference() {
    let mut g = sample();

    g.redirect(1, 2);

    let edge = &g.edges(0)[0];
    assert_eq!(edge.to, Some(2));
    assert_eq!(edge.calls().collect::<Vec<_>>(), vec![(2, 0)]);
    assert_eq!(g.edges(2)[0].to, Some(2));
}

#[test]
fn successors_include_return_addresses_and_lookaheads() {
    let edge = Edge::new(
        Some(4),
        MatchExpr::Lookahead {
            positive: true,
            target: crate::LookaheadTarget::Node(7),
        },
        vec![Effect::Call {
            target: 4,
            return_to: 5,
        }],
    );

    assert_eq!(edge.successors(), vec![4, 5, 7]);
}

#[test]
fn live_iteration_skips_dead() {
    let mut g = sample();
    g.kill(1);

    assert_eq!(g.live_nodes().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(g.live_count(), 2);
    assert!(g.get(1).is_none());
    assert!(g.is_entry(0));
}

#[test]
fn serializes_through_serde() {
    let g = sample();

    let json = serde_json::to_string(&g).unwrap();
    let back: Graph = serde_json::from_str(&json).unwrap();

    assert_eq!(back, g);
}
