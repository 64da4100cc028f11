//! Structural duplicate merging.
//!
//! Two nodes with identical edge lists behave identically, so every
//! reference to the later one can point at the earlier one. Entries are
//! visited first and never merged away.

use std::collections::HashMap;

use grammode_core::{Edge, Graph, NodeId};

/// Merge nodes with identical edge lists. Returns how many were merged away.
///
/// One pass; merging can expose further duplicates, which the next
/// simplifier round picks up.
pub fn merge_duplicates(graph: &mut Graph) -> usize {
    let order: Vec<NodeId> = graph
        .entries()
        .chain(graph.live_nodes().filter(|&id| !graph.is_entry(id)))
        .collect();

    let mut seen: HashMap<Vec<Edge>, NodeId> = HashMap::new();
    let mut merged = 0;
    for id in order {
        if !graph.is_live(id) {
            continue;
        }
        let edges = graph.edges(id).to_vec();
        match seen.get(&edges) {
            Some(&keep) if !graph.is_entry(id) => {
                graph.redirect(id, keep);
                graph.kill(id);
                merged += 1;
            }
            Some(_) => {}
            None => {
                seen.insert(edges, id);
            }
        }
    }
    merged
}
