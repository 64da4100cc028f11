//! Text dump of a `Graph` for snapshot tests and debugging.

use std::fmt;

use crate::graph::{Edge, Effect, Graph};

/// Printer for `Graph` with configurable output options.
///
/// ```text
/// N0 START
///     ε [call N2 ↩ N0] → N2
/// N2 Expr
///     '0'-'9'+ [push num:number, pop, ret] → ∅
/// ```
pub struct GraphPrinter<'a> {
    graph: &'a Graph,
    show_dead: bool,
}

impl<'a> GraphPrinter<'a> {
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            show_dead: false,
        }
    }

    /// Include nodes removed by earlier passes, marked with `✗`.
    pub fn show_dead(mut self, show: bool) -> Self {
        self.show_dead = show;
        self
    }

    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GraphPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in 0..self.graph.len() as u32 {
            let live = self.graph.is_live(id);
            if !live && !self.show_dead {
                continue;
            }

            let node = self.graph.node(id);
            if live {
                writeln!(f, "N{} {}", id, node.label)?;
            } else {
                writeln!(f, "N{} ✗ {}", id, node.label)?;
            }
            for edge in &node.edges {
                writeln!(f, "    {}", EdgeDisplay(edge))?;
            }
        }
        Ok(())
    }
}

struct EdgeDisplay<'a>(&'a Edge);

impl fmt::Display for EdgeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edge = self.0;
        write!(f, "{}", edge.matcher)?;

        if !edge.effects.is_empty() {
            write!(f, " [")?;
            for (i, effect) in edge.effects.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                match effect {
                    Effect::Call { target, return_to } => {
                        write!(f, "call N{} ↩ N{}", target, return_to)?
                    }
                    Effect::PushContext {
                        name,
                        style: Some(style),
                    } => write!(f, "push {}:{}", name, style)?,
                    Effect::PushContext { name, style: None } => write!(f, "push {}", name)?,
                    Effect::PopContext => write!(f, "pop")?,
                    Effect::Return => write!(f, "ret")?,
                }
            }
            write!(f, "]")?;
        }

        match edge.to {
            Some(to) => write!(f, " → N{}", to),
            None => write!(f, " → ∅"),
        }
    }
}
