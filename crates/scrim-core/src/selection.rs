//! Per-frame resolution of the active script set.

use crate::script::Registry;
use crate::trigger::TriggerTable;
use std::collections::HashSet;

/// The scripts eligible to display for one frame, in order, plus the
/// query that remains after prefix stripping. Recomputed from scratch
/// every frame and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub scripts: Vec<String>,
    pub query: String,
}

/// Compute the active script set for a raw query.
///
/// A first token matching a prefix trigger substitutes that trigger's
/// scripts and strips the token from the query. Chain triggers expand
/// transitively; the visited set stops cycles and collapses scripts
/// reachable by multiple paths. An empty result falls back to every
/// configured script in configuration order.
#[must_use]
pub fn resolve(raw_query: &str, table: &TriggerTable, registry: &Registry) -> Selection {
    let mut scripts: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut query = raw_query.to_string();

    if let Some((left, rest)) = raw_query.split_once(' ')
        && let Some(matched) = table.prefix_scripts(left)
    {
        for name in matched {
            if seen.insert(name.clone()) {
                scripts.push(name.clone());
            }
        }
        query = rest.to_string();
    }

    let mut i = 0;
    while i < scripts.len() {
        let name = scripts[i].clone();
        for target in table.chained(&name) {
            if seen.insert(target.clone()) {
                scripts.push(target.clone());
            }
        }
        i += 1;
    }

    if scripts.is_empty() {
        scripts.extend(registry.iter().map(|s| s.name().to_string()));
    }

    Selection { scripts, query }
}
