use grammode_compiler::{CompileOptions, Expr, Grammar, RuleDecl, compile, compile_json};
use grammode_core::{Edge, Effect, Graph, MatchExpr, NodeId};
use indoc::indoc;

use super::*;

const ARITH: &str = indoc! {r#"
    {
      "rules": {
        "Expr": {
          "skip": { "type": "SYMBOL", "name": "space" },
          "body": { "type": "SEQ", "members": [
            { "type": "CHOICE", "members": [
              { "type": "SYMBOL", "name": "num" },
              { "type": "SYMBOL", "name": "var" },
              { "type": "SYMBOL", "name": "Paren" }
            ] },
            { "type": "OPTIONAL", "content": { "type": "SEQ", "members": [
              { "type": "SYMBOL", "name": "op" },
              { "type": "SYMBOL", "name": "Expr" }
            ] } }
          ] }
        },
        "Paren": {
          "context": true,
          "skip": { "type": "SYMBOL", "name": "space" },
          "body": { "type": "SEQ", "members": [
            { "type": "STRING", "value": "(" },
            { "type": "SYMBOL", "name": "Expr" },
            { "type": "STRING", "value": ")" }
          ] }
        },
        "num": { "token": true, "style": "number",
                 "body": { "type": "REPEAT1", "content": { "type": "RANGE", "from": "0", "to": "9" } } },
        "var": { "token": true, "style": "variable",
                 "body": { "type": "REPEAT1", "content": { "type": "RANGE", "from": "a", "to": "z" } } },
        "op": { "token": true, "style": "op",
                "body": { "type": "CHOICE", "members": [
                  { "type": "STRING", "value": "+" },
                  { "type": "STRING", "value": "-" },
                  { "type": "STRING", "value": "*" },
                  { "type": "STRING", "value": "/" }
                ] } },
        "space": { "body": { "type": "REPEAT", "content": { "type": "STRING", "value": " " } } }
      }
    }
"#};

fn arith_with(limits: MatchLimits) -> Mode {
    let graph = compile_json(ARITH, &CompileOptions::new()).unwrap();
    let program = Program::load(&graph, &Predicates::new()).unwrap();
    Mode::with_limits(program, limits)
}

fn arith_raw() -> Mode {
    let graph = compile_json(ARITH, &CompileOptions::new().simplify(false)).unwrap();
    Mode::new(Program::load(&graph, &Predicates::new()).unwrap())
}

fn arith() -> Mode {
    arith_with(MatchLimits::default())
}

/// Word tokens styled `label` when the next line starts with a colon.
fn labels(limits: MatchLimits) -> Mode {
    let letters = || Expr::plus(Expr::range('a', 'z'));
    let grammar = Grammar::new(vec![
        RuleDecl::new(
            "doc",
            Expr::choice(vec![Expr::reference("label"), Expr::reference("word")]),
        )
        .with_start(),
        RuleDecl::new(
            "label",
            Expr::seq(vec![
                Expr::lookahead(true, Expr::reference("labelled")),
                letters(),
            ]),
        )
        .with_token()
        .with_style("label"),
        RuleDecl::new("word", letters()).with_token().with_style("word"),
        RuleDecl::new(
            "labelled",
            Expr::seq(vec![letters(), Expr::literal("\n:")]),
        ),
    ]);
    let graph = compile(&grammar, &CompileOptions::new()).unwrap();
    let program = Program::load(&graph, &Predicates::new()).unwrap();
    Mode::with_limits(program, limits)
}

/// Bracketed lists of `a`, each followed by `;`. Lists nest, and the
/// closing bracket is the last step of its node, so a missing one can be
/// skipped. After a list, a `;` is tried through the `semi` rule first.
fn lists(limits: MatchLimits) -> Mode {
    let mut graph = Graph::new();
    let start = graph.start();
    let open = graph.add_node("open", Default::default());
    let items = graph.add_node("items", Default::default());
    let after = graph.add_node("after", Default::default());
    let semi = graph.add_node("semi", Default::default());
    let token = graph.add_node("TOKEN", Default::default());
    let token_end = graph.add_node("TOKEN_end", Default::default());

    let call = |target: NodeId, return_to: NodeId| Effect::Call { target, return_to };
    let scope = |name: &str| Effect::PushContext {
        name: name.to_string(),
        style: Some(name.to_string()),
    };
    let close = || vec![Effect::PopContext, Effect::Return];

    graph.add_edge(start, Edge::new(Some(open), MatchExpr::Null, vec![call(open, after)]));
    graph.add_edge(open, Edge::new(Some(items), MatchExpr::literal("["), vec![scope("list")]));
    graph.add_edge(items, Edge::new(Some(open), MatchExpr::Null, vec![call(open, items)]));
    graph.add_edge(items, Edge::new(Some(items), MatchExpr::literal("a"), vec![]));
    graph.add_edge(items, Edge::new(None, MatchExpr::literal("]"), close()));
    graph.add_edge(after, Edge::new(Some(semi), MatchExpr::Null, vec![call(semi, start)]));
    graph.add_edge(after, Edge::new(Some(start), MatchExpr::literal(";"), vec![]));
    let mut effects = vec![scope("punct")];
    effects.extend(close());
    graph.add_edge(semi, Edge::new(None, MatchExpr::literal(";"), effects));

    graph.add_edge(token, Edge::new(Some(token_end), MatchExpr::Any, vec![]));
    graph.add_edge(token_end, Edge::new(None, MatchExpr::Null, vec![Effect::Return]));
    graph.set_token(Some(token));

    let program = Program::load(&graph, &Predicates::new()).unwrap();
    Mode::with_limits(program, limits)
}

/// Tokenizes `lines` the way an editor would, checking the runtime's
/// guarantees after every step.
fn tokenize(mode: &Mode, state: &mut State, lines: &[&str]) -> Vec<(String, Option<String>)> {
    let mut tokens = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let following = &lines[i + 1..];
        if line.is_empty() {
            mode.advance_blank_line(state, following);
            continue;
        }

        let mut pos = 0;
        while pos < line.len() {
            let step = mode.advance_token(state, line, pos, following);
            assert!(step.consumed > 0, "no progress at {pos} in {line:?}");
            assert!(pos + step.consumed <= line.len());
            for context in state.contexts() {
                assert!(context.depth() <= state.stack().len());
            }
            tokens.push((line[pos..pos + step.consumed].to_string(), step.style));
            pos += step.consumed;
        }
        assert_eq!(mode.advance_token(state, line, pos, following), Advance::default());
    }
    tokens
}

fn render(tokens: &[(String, Option<String>)]) -> String {
    tokens
        .iter()
        .map(|(text, style)| format!("{:?} {}", text, style.as_deref().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn styled(tokens: Vec<(String, Option<String>)>) -> Vec<(String, String)> {
    tokens
        .into_iter()
        .filter_map(|(text, style)| Some((text, style?)))
        .collect()
}

/// Joins neighboring tokens of the same style.
fn runs(tokens: Vec<(String, Option<String>)>) -> Vec<(String, Option<String>)> {
    let mut out: Vec<(String, Option<String>)> = Vec::new();
    for (text, style) in tokens {
        match out.last_mut() {
            Some((prev, prev_style)) if *prev_style == style => prev.push_str(&text),
            _ => out.push((text, style)),
        }
    }
    out
}

fn context_names(state: &State) -> Vec<&str> {
    state.contexts().map(Context::name).collect()
}

#[test]
fn arithmetic_line() {
    let mode = arith();
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["12+3"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "12" number
    "+" op
    "3" number
    "#);
    assert!(state.context().is_none());
}

#[test]
fn simplification_keeps_styles() {
    let raw = arith_raw();
    let simplified = arith();

    for line in ["12+3", "(a+b", "1 + 2"] {
        let mut raw_state = raw.start_state();
        let mut state = simplified.start_state();

        let expected = runs(tokenize(&raw, &mut raw_state, &[line]));
        let actual = runs(tokenize(&simplified, &mut state, &[line]));

        assert_eq!(actual, expected, "{line:?}");
        assert_eq!(context_names(&state), context_names(&raw_state), "{line:?}");
    }
}

#[test]
fn skipped_whitespace_is_unstyled() {
    let mode = arith();

    let spaced = tokenize(&mode, &mut mode.start_state(), &["1 + 2"]);
    let tight = tokenize(&mode, &mut mode.start_state(), &["1+2"]);

    assert_eq!(styled(spaced), styled(tight));
}

#[test]
fn open_paren_carries_to_the_next_line() {
    let mode = arith();
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["(a+b"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "(" -
    "a" variable
    "+" op
    "b" variable
    "#);
    assert_eq!(context_names(&state), ["Paren"]);

    let tokens = tokenize(&mode, &mut state, &[")"]);

    insta::assert_snapshot!(render(&tokens), @r#"")" -"#);
    assert!(state.context().is_none());
}

#[test]
fn expression_split_across_lines() {
    let mode = arith();
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["(a +", "", "  b)"]);

    assert_eq!(
        styled(tokens),
        [
            ("a".to_string(), "variable".to_string()),
            ("+".to_string(), "op".to_string()),
            ("b".to_string(), "variable".to_string()),
        ]
    );
    assert!(state.context().is_none());
}

#[test]
fn garbage_always_makes_progress() {
    let mode = arith();
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["#é%"]);

    insta::assert_snapshot!(render(&tokens), @r##"
    "#" -
    "é" -
    "%" -
    "##);
    assert_eq!(state, mode.start_state());
}

#[test]
fn garbage_lines_leave_the_start_state() {
    let mode = arith();
    let mut state = mode.start_state();

    for _ in 0..6 {
        tokenize(&mode, &mut state, &["#"]);
        assert_eq!(state, mode.start_state());
    }
}

#[test]
fn open_contexts_follow_the_brackets() {
    let mode = arith();
    let mut state = mode.start_state();
    let line = "((a)+(b))";

    let mut pos = 0;
    while pos < line.len() {
        pos += mode.advance_token(&mut state, line, pos, &NoLookahead).consumed;
        let seen = &line[..pos];
        let depth = seen.matches('(').count() - seen.matches(')').count();

        assert!(context_names(&state).iter().all(|name| *name == "Paren"));
        assert_eq!(state.contexts().count(), depth, "after {seen:?}");
    }
    assert!(state.context().is_none());
}

#[test]
fn token_scopes_close_before_the_next_line() {
    let mode = labels(MatchLimits::default());
    let mut state = mode.start_state();

    tokenize(&mode, &mut state, &["abc"]);
    assert!(state.context().is_none());

    let tokens = tokenize(&mode, &mut state, &[":"]);
    insta::assert_snapshot!(render(&tokens), @r#"":" -"#);
}

#[test]
fn fallback_unwinds_finished_rules() {
    let mode = arith_raw();
    let mut state = mode.start_state();
    let line = "(a#";
    assert_eq!(mode.advance_token(&mut state, line, 0, &NoLookahead).consumed, 1);
    assert_eq!(mode.advance_token(&mut state, line, 1, &NoLookahead).consumed, 1);
    assert_eq!(context_names(&state), ["var", "Paren"]);
    let mut tracer = PrintTracer::new(mode.program(), Verbosity::Default);

    let step = mode.advance_token_with(&mut state, line, 2, &NoLookahead, &mut tracer);

    assert_eq!(step, Advance { consumed: 1, style: None });
    assert!(tracer.lines().iter().any(|l| l.starts_with("unwind")));
    assert_eq!(context_names(&state), ["Paren"]);
}

#[test]
fn contexts_record_where_they_open() {
    let mode = arith();
    let mut state = mode.start_state();

    tokenize(&mode, &mut state, &["1+(a+(b"]);
    let starts: Vec<usize> = state.contexts().map(Context::start).collect();
    assert_eq!(starts, [5, 2]);

    let mut state = mode.start_state();
    tokenize(&mode, &mut state, &["1+(", "a"]);
    assert_eq!(state.context().map(Context::start), Some(2));
}

#[test]
fn forced_skip_closes_an_unterminated_list() {
    let mode = lists(MatchLimits::default());
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["[a;"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "[" list
    "a" list
    ";" -
    "#);
    assert_eq!(state, mode.start_state());
}

#[test]
fn closed_list_reaches_the_semi_rule() {
    let mode = lists(MatchLimits::default());
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["[a];"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "[" list
    "a" list
    "]" list
    ";" punct
    "#);
    assert_eq!(state, mode.start_state());
}

#[test]
fn without_skips_the_list_stays_open() {
    let mode = lists(MatchLimits::new().max_skip(0));
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["[a;"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "[" list
    "a" list
    ";" list
    "#);
    assert_eq!(context_names(&state), ["list"]);
}

#[test]
fn each_forced_step_spends_the_budget() {
    let one = lists(MatchLimits::new().max_skip(1));
    let mut state = one.start_state();

    let tokens = tokenize(&one, &mut state, &["[[a;"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "[" list
    "[" list list
    "a" list list
    ";" list list
    "#);
    assert_eq!(context_names(&state), ["list", "list"]);

    let two = lists(MatchLimits::default());
    let mut state = two.start_state();
    let tokens = tokenize(&two, &mut state, &["[[a;"]);

    assert_eq!(tokens.last(), Some(&(";".to_string(), None)));
    assert_eq!(state, two.start_state());
}

#[test]
fn blank_line_inside_parens_keeps_state() {
    let mode = arith();
    let mut state = mode.start_state();
    tokenize(&mode, &mut state, &["(a"]);
    let before = mode.copy_state(&state);

    mode.advance_blank_line(&mut state, &NoLookahead);

    assert_eq!(state, before);
    assert_eq!(context_names(&state), ["Paren"]);
}

#[test]
fn copied_states_diverge() {
    let mode = arith();
    let mut state = mode.start_state();
    tokenize(&mode, &mut state, &["(a"]);
    let mut copy = mode.copy_state(&state);

    tokenize(&mode, &mut copy, &[")"]);

    assert_eq!(context_names(&state), ["Paren"]);
    assert!(copy.context().is_none());
}

#[test]
fn context_at_position() {
    let mode = arith();
    let state = mode.start_state();

    let at_open = mode.context_at(&state, "(a+b", 0, &NoLookahead);
    let inside = mode.context_at(&state, "(a+b", 2, &NoLookahead);

    assert!(at_open.is_none());
    assert_eq!(inside.as_deref().map(Context::name), Some("Paren"));
}

#[test]
fn recursion_limit_falls_back_to_single_tokens() {
    let mode = arith_with(MatchLimits::new().recursion_limit(0));
    let mut state = mode.start_state();

    let tokens = tokenize(&mode, &mut state, &["(a+b"]);

    let text: String = tokens.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(text, "(a+b");
    assert!(state.context().is_none());
}

#[test]
fn lookahead_reads_following_lines() {
    let mode = labels(MatchLimits::default());

    let tokens = tokenize(&mode, &mut mode.start_state(), &["abc", ":"]);
    insta::assert_snapshot!(render(&tokens), @r#"
    "abc" label
    ":" -
    "#);

    let tokens = tokenize(&mode, &mut mode.start_state(), &["abc", "x"]);
    insta::assert_snapshot!(render(&tokens), @r#"
    "abc" word
    "x" word
    "#);
}

#[test]
fn lookahead_window_is_limited() {
    let mode = labels(MatchLimits::new().lookahead_lines(0));

    let tokens = tokenize(&mode, &mut mode.start_state(), &["abc", ":"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "abc" word
    ":" -
    "#);
}

#[test]
fn predicates_see_line_offsets() {
    let grammar = Grammar::new(vec![
        RuleDecl::new(
            "doc",
            Expr::choice(vec![Expr::reference("kw"), Expr::reference("plain")]),
        )
        .with_start(),
        RuleDecl::new(
            "kw",
            Expr::seq(vec![Expr::predicate("line_start"), Expr::literal("x")]),
        )
        .with_token()
        .with_style("keyword"),
        RuleDecl::new("plain", Expr::literal("x"))
            .with_token()
            .with_style("plain"),
    ]);
    let graph = compile(&grammar, &CompileOptions::new()).unwrap();

    let err = Program::load(&graph, &Predicates::new()).err();
    assert_eq!(err, Some(LoadError::UnknownPredicate("line_start".to_string())));

    let predicates = Predicates::new().with("line_start", |_, pos, _| pos == 0);
    let mode = Mode::new(Program::load(&graph, &predicates).unwrap());
    let tokens = tokenize(&mode, &mut mode.start_state(), &["xx"]);

    insta::assert_snapshot!(render(&tokens), @r#"
    "x" keyword
    "x" plain
    "#);
}

#[test]
fn tracer_records_matches() {
    let mode = arith();
    let mut state = mode.start_state();
    let mut tracer = PrintTracer::new(mode.program(), Verbosity::VeryVerbose);

    let step = mode.advance_token_with(&mut state, "12", 0, &NoLookahead, &mut tracer);

    assert_eq!(step.consumed, 2);
    let lines = tracer.lines();
    assert!(lines.iter().any(|l| l.starts_with("enter")));
    assert!(lines.iter().any(|l| l.starts_with("match") && l.ends_with(" 0..2")));
    assert!(lines.iter().any(|l| l == "fallback  TOKEN @2"));
}

#[test]
fn default_tracer_omits_enter_events() {
    let mode = arith();
    let mut state = mode.start_state();
    let mut tracer = PrintTracer::new(mode.program(), Verbosity::Default);

    mode.advance_token_with(&mut state, "12", 0, &NoLookahead, &mut tracer);

    assert!(!tracer.dump().contains("enter"));
    assert!(tracer.dump().contains("match"));
}
