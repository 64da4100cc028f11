//! JSON form of the rule-expression tree.
//!
//! Expressions use a `type` tag in the style of tree-sitter's grammar.json:
//!
//! ```json
//! {
//!   "rules": {
//!     "Expr": { "skip": { "type": "SYMBOL", "name": "space" },
//!               "body": { "type": "SEQ", "members": [ ... ] } },
//!     "num": { "token": true, "style": "number",
//!              "body": { "type": "REPEAT1",
//!                        "content": { "type": "RANGE", "from": "0", "to": "9" } } }
//!   }
//! }
//! ```
//!
//! Rule order follows the document. Every rule and expression accepts an
//! optional `"span": [start, end]` pointing into the grammar source.

use grammode_core::{RepeatKind, Span};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::ast::{Expr, ExprKind, Grammar, RuleDecl};

#[cfg(test)]
#[path = "json_tests.rs"]
mod json_tests;

#[derive(Debug, thiserror::Error)]
pub enum GrammarLoadError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Grammar {
    /// Parse a grammar from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, GrammarLoadError> {
        let raw: RawGrammar = serde_json::from_str(json)?;
        Ok(raw.into())
    }
}

#[derive(Debug, Deserialize)]
struct RawGrammar {
    rules: IndexMap<String, RawRule>,
}

impl From<RawGrammar> for Grammar {
    fn from(raw: RawGrammar) -> Self {
        Self {
            rules: raw
                .rules
                .into_iter()
                .map(|(name, rule)| rule.into_decl(name))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    context: bool,
    #[serde(default)]
    token: bool,
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    start: bool,
    #[serde(default)]
    skip: Option<RawExpr>,
    body: RawExpr,
    #[serde(default)]
    span: Option<[u32; 2]>,
}

impl RawRule {
    fn into_decl(self, name: String) -> RuleDecl {
        RuleDecl {
            name,
            params: self.params,
            context: self.context,
            token: self.token,
            style: self.style,
            start: self.start,
            skip: self.skip.map(Into::into),
            body: self.body.into(),
            span: to_span(self.span),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawExpr {
    #[serde(flatten)]
    kind: RawExprKind,
    #[serde(default)]
    span: Option<[u32; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
enum RawExprKind {
    BLANK,
    STRING {
        value: String,
    },
    RANGE {
        from: char,
        to: char,
    },
    ANY,
    SYMBOL {
        name: String,
        #[serde(default)]
        args: Vec<RawExpr>,
    },
    SEQ {
        members: Vec<RawExpr>,
    },
    CHOICE {
        members: Vec<RawExpr>,
    },
    REPEAT {
        content: Box<RawExpr>,
    },
    REPEAT1 {
        content: Box<RawExpr>,
    },
    OPTIONAL {
        content: Box<RawExpr>,
    },
    LOOKAHEAD {
        content: Box<RawExpr>,
    },
    NEG_LOOKAHEAD {
        content: Box<RawExpr>,
    },
    PREDICATE {
        name: String,
    },
}

impl From<RawExpr> for Expr {
    fn from(raw: RawExpr) -> Self {
        let kind = match raw.kind {
            RawExprKind::BLANK => ExprKind::Sequence(Vec::new()),
            RawExprKind::STRING { value } => ExprKind::Literal(value),
            RawExprKind::RANGE { from, to } => ExprKind::Range { from, to },
            RawExprKind::ANY => ExprKind::Any,
            RawExprKind::SYMBOL { name, args } => ExprKind::Ref {
                name,
                args: args.into_iter().map(Into::into).collect(),
            },
            RawExprKind::SEQ { members } => {
                ExprKind::Sequence(members.into_iter().map(Into::into).collect())
            }
            RawExprKind::CHOICE { members } => {
                ExprKind::Choice(members.into_iter().map(Into::into).collect())
            }
            RawExprKind::REPEAT { content } => repeat(RepeatKind::ZeroOrMore, *content),
            RawExprKind::REPEAT1 { content } => repeat(RepeatKind::OneOrMore, *content),
            RawExprKind::OPTIONAL { content } => repeat(RepeatKind::Optional, *content),
            RawExprKind::LOOKAHEAD { content } => ExprKind::Lookahead {
                positive: true,
                expr: Box::new((*content).into()),
            },
            RawExprKind::NEG_LOOKAHEAD { content } => ExprKind::Lookahead {
                positive: false,
                expr: Box::new((*content).into()),
            },
            RawExprKind::PREDICATE { name } => ExprKind::Predicate(name),
        };
        Expr {
            kind,
            span: to_span(raw.span),
        }
    }
}

fn repeat(kind: RepeatKind, content: RawExpr) -> ExprKind {
    ExprKind::Repeat {
        kind,
        expr: Box::new(content.into()),
    }
}

fn to_span(raw: Option<[u32; 2]>) -> Span {
    raw.map(|[start, end]| Span::new(start, end))
        .unwrap_or_default()
}
