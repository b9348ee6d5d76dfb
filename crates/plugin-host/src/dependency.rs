//! Dependency graph and deterministic load-order resolution.
//!
//! The graph is built purely from declared dependency edges (it never
//! inspects loaded instances), so it can answer questions about plugins
//! that aren't loaded yet — used by the lifecycle controller to decide
//! whether a hot reload needs to cascade before anything is touched.

use std::collections::{HashMap, HashSet};

use crate::error::PluginError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unseen,
    OnStack,
    Finished,
}

/// Required- and optional-dependency edges, keyed by the dependent plugin.
#[derive(Debug, Default)]
struct DependencyGraph {
    required: HashMap<String, Vec<String>>,
    optional: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    fn neighbors(&self, node: &str) -> impl Iterator<Item = &str> {
        let required = self.required.get(node).into_iter().flatten();
        let optional = self.optional.get(node).into_iter().flatten();
        required.chain(optional).map(String::as_str)
    }

    fn all_nodes(&self) -> HashSet<&str> {
        let mut nodes = HashSet::new();
        for (plugin, deps) in self.required.iter().chain(self.optional.iter()) {
            nodes.insert(plugin.as_str());
            nodes.extend(deps.iter().map(String::as_str));
        }
        nodes
    }
}

/// Resolves the order plugins must load in so every dependency is live
/// before its dependent, using a depth-first traversal with three-color
/// marking to both order the graph and detect cycles in one pass.
#[derive(Debug, Default)]
pub struct DependencyResolver {
    graph: DependencyGraph,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `plugin` depends on `dependency`. Edges are kept in the
    /// order they're added, which is the tie-break used when a node has
    /// more than one neighbor. Idempotent: re-adding the same edge is a
    /// no-op.
    pub fn add_dependency(&mut self, plugin: &str, dependency: &str, optional: bool) {
        let list = if optional {
            self.graph
                .optional
                .entry(plugin.to_string())
                .or_default()
        } else {
            self.graph
                .required
                .entry(plugin.to_string())
                .or_default()
        };
        if !list.iter().any(|existing| existing == dependency) {
            list.push(dependency.to_string());
        }
    }

    /// This plugin's required dependencies, in insertion order.
    pub fn dependencies_of(&self, plugin: &str) -> Vec<String> {
        self.graph
            .required
            .get(plugin)
            .cloned()
            .unwrap_or_default()
    }

    /// This plugin's optional dependencies, in insertion order.
    pub fn optional_dependencies_of(&self, plugin: &str) -> Vec<String> {
        self.graph
            .optional
            .get(plugin)
            .cloned()
            .unwrap_or_default()
    }

    /// Forgets every edge.
    pub fn clear(&mut self) {
        self.graph.required.clear();
        self.graph.optional.clear();
    }

    /// Orders `available` so each plugin's required and optional
    /// dependencies precede it, provided those dependencies are themselves
    /// in `available` (a dependency absent from `available` is simply
    /// skipped, not an error — the registry is responsible for deciding
    /// whether a missing required dependency blocks a load).
    ///
    /// Traversal visits `available` in the given order, descending
    /// depth-first through each node's required-then-optional neighbors
    /// (each in the order they were added). A node is appended to the
    /// result only once every neighbor reachable from it has finished,
    /// which already places dependencies before dependents — no
    /// post-hoc reversal is needed.
    ///
    /// Re-entering a node that is still on the current DFS stack means a
    /// cycle; the error names the dependency being re-entered.
    pub fn resolve_load_order(&self, available: &[String]) -> Result<Vec<String>, PluginError> {
        let available_set: HashSet<&str> = available.iter().map(String::as_str).collect();
        let mut colors: HashMap<String, Color> = HashMap::new();
        let mut order: Vec<String> = Vec::with_capacity(available.len());

        for name in available {
            if !matches!(colors.get(name.as_str()), Some(Color::Finished)) {
                self.visit(name, &available_set, &mut colors, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node: &str,
        available: &HashSet<&str>,
        colors: &mut HashMap<String, Color>,
        order: &mut Vec<String>,
    ) -> Result<(), PluginError> {
        colors.insert(node.to_string(), Color::OnStack);

        for dep in self.graph.neighbors(node) {
            if !available.contains(dep) {
                continue;
            }
            match colors.get(dep).copied().unwrap_or(Color::Unseen) {
                Color::Unseen => self.visit(dep, available, colors, order)?,
                Color::OnStack => return Err(PluginError::Cycle(dep.to_string())),
                Color::Finished => {}
            }
        }

        colors.insert(node.to_string(), Color::Finished);
        order.push(node.to_string());
        Ok(())
    }

    /// Whether the full known graph (every node that appears as either a
    /// dependent or a dependency target, loaded or not) contains a cycle.
    pub fn has_cycles(&self) -> bool {
        let nodes = self.graph.all_nodes();
        let owned: Vec<String> = nodes.iter().map(|s| s.to_string()).collect();
        self.resolve_load_order(&owned).is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn linear_chain_loads_dependency_first() {
        let mut resolver = DependencyResolver::new();
        resolver.add_dependency("B", "A", false);
        resolver.add_dependency("C", "B", false);

        let order = resolver.resolve_load_order(&names(&["A", "B", "C"])).unwrap();
        assert_eq!(order, names(&["A", "B", "C"]));
    }

    #[test]
    fn diamond_dependency_is_deterministic_across_available_orderings() {
        let mut resolver = DependencyResolver::new();
        resolver.add_dependency("B", "A", false);
        resolver.add_dependency("C", "A", false);
        resolver.add_dependency("D", "C", false);
        resolver.add_dependency("D", "B", false);

        let order_a = resolver
            .resolve_load_order(&names(&["A", "B", "C", "D"]))
            .unwrap();
        assert_eq!(order_a, names(&["A", "B", "C", "D"]));

        let order_b = resolver
            .resolve_load_order(&names(&["D", "C", "B", "A"]))
            .unwrap();
        assert_eq!(order_b, names(&["A", "C", "B", "D"]));
    }

    #[test]
    fn cycle_reports_the_reentered_node() {
        let mut resolver = DependencyResolver::new();
        resolver.add_dependency("A", "B", false);
        resolver.add_dependency("B", "C", false);
        resolver.add_dependency("C", "A", false);

        let err = resolver
            .resolve_load_order(&names(&["A", "B", "C"]))
            .unwrap_err();
        assert!(matches!(err, PluginError::Cycle(name) if name == "A"));
    }

    #[test]
    fn has_cycles_sees_nodes_that_only_appear_as_targets() {
        let mut resolver = DependencyResolver::new();
        resolver.add_dependency("A", "B", false);
        assert!(!resolver.has_cycles());

        resolver.add_dependency("B", "A", false);
        assert!(resolver.has_cycles());
    }

    #[test]
    fn unreachable_dependency_is_skipped_not_erred() {
        let mut resolver = DependencyResolver::new();
        resolver.add_dependency("B", "A", false);
        let order = resolver.resolve_load_order(&names(&["B"])).unwrap();
        assert_eq!(order, names(&["B"]));
    }

    #[test]
    fn clear_forgets_all_edges() {
        let mut resolver = DependencyResolver::new();
        resolver.add_dependency("B", "A", false);
        resolver.clear();
        assert!(resolver.dependencies_of("B").is_empty());
        assert!(!resolver.has_cycles());
    }
}
