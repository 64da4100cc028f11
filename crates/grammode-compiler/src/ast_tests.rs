use super::*;

fn space() -> Expr {
    Expr::reference("space")
}

fn names(expr: &Expr) -> Vec<String> {
    let ExprKind::Sequence(items) = &expr.kind else {
        panic!("expected a sequence, got {expr:?}");
    };
    items
        .iter()
        .map(|e| match &e.kind {
            ExprKind::Ref { name, .. } => name.clone(),
            ExprKind::Literal(value) => format!("{value:?}"),
            other => format!("{other:?}"),
        })
        .collect()
}

#[test]
fn normalize_threads_skip_between_items() {
    let body = Expr::seq(vec![
        Expr::reference("a"),
        Expr::literal("+"),
        Expr::reference("b"),
    ]);

    let out = body.normalize(Some(&space()));

    assert_eq!(names(&out), ["a", "space", "\"+\"", "space", "b"]);
}

#[test]
fn normalize_without_skip_only_flattens() {
    let body = Expr::seq(vec![
        Expr::reference("a"),
        Expr::seq(vec![Expr::reference("b"), Expr::reference("c")]),
    ]);

    let out = body.normalize(None);

    assert_eq!(names(&out), ["a", "b", "c"]);
}

#[test]
fn normalize_skips_nothing_next_to_isolated() {
    let body = Expr::seq(vec![
        Expr::reference("a"),
        Expr::literal("\n"),
        Expr::lookahead(false, Expr::literal("x")),
        Expr::reference("b"),
    ]);

    let out = body.normalize(Some(&space()));

    assert_eq!(names(&out)[..2], ["a", "\"\\n\""]);
    assert!(!names(&out).contains(&"space".to_string()));
}

#[test]
fn normalize_loops_carry_skip_inside() {
    let body = Expr::seq(vec![Expr::star(Expr::reference("a")), Expr::reference("b")]);

    let out = body.normalize(Some(&space()));

    let ExprKind::Sequence(items) = &out.kind else {
        panic!("expected a sequence");
    };
    assert_eq!(items.len(), 2, "no skip after a loop");
    let ExprKind::Repeat { expr, .. } = &items[0].kind else {
        panic!("expected a repeat");
    };
    assert_eq!(names(expr), ["a", "space"]);
}

#[test]
fn substitute_replaces_params_in_args() {
    let body = Expr::seq(vec![
        Expr::reference("x"),
        Expr::call("wrap", vec![Expr::reference("x")]),
    ]);

    let out = body.substitute(&["x".to_string()], &[Expr::literal("k")]);

    let expected = Expr::seq(vec![
        Expr::literal("k"),
        Expr::call("wrap", vec![Expr::literal("k")]),
    ]);
    assert!(out.same_shape(&expected));
}

#[test]
fn same_shape_ignores_spans() {
    let a = Expr::literal("x").at(Span::new(0, 3));
    let b = Expr::literal("x").at(Span::new(10, 13));

    assert!(a.same_shape(&b));
    assert_ne!(a, b);
    assert!(!a.same_shape(&Expr::literal("y")));
}

#[test]
fn simple_match_from_call_free_expressions() {
    let expr = Expr::choice(vec![
        Expr::literal("ab"),
        Expr::plus(Expr::range('0', '9')),
    ]);

    let m = expr.as_simple_match();

    assert_eq!(
        m.map(|m| m.to_string()).as_deref(),
        Some(r#""ab" | '0'-'9'+"#)
    );
    assert_eq!(Expr::reference("a").as_simple_match(), None);
}

#[test]
fn visit_refs_reaches_arguments() {
    let expr = Expr::call("list", vec![Expr::opt(Expr::reference("item"))]);
    let mut seen = Vec::new();

    expr.visit_refs(&mut |name, _, _| seen.push(name));

    assert_eq!(seen, ["list", "item"]);
}
