//! Graph builder and compiled graph.
//!
//! `GraphBuilder` collects nodes, edges and interrupt points; `build` validates
//! every reference and produces an immutable `CompiledGraph` that the executor
//! walks one node at a time.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

use super::error::{EngineError, GraphDefinitionError};
use super::node::{Node, NodeKind};
use super::state::WorkflowState;

/// Terminal marker. Routing to it ends the run.
pub const END: &str = "__end__";

/// Named outcomes of one router. `ALL` lists every variant so `build` can
/// reject a mapping that leaves one without a destination.
pub trait Outcome: Copy + Eq + Debug + Send + Sync + 'static {
    const ALL: &'static [Self];
}

type RouteFn<S> = Arc<dyn Fn(&S) -> Option<usize> + Send + Sync>;

struct Branch<S> {
    route: RouteFn<S>,
    /// Indexed like `Outcome::ALL`.
    labels: Vec<String>,
    targets: Vec<String>,
}

impl<S> Clone for Branch<S> {
    fn clone(&self) -> Self {
        Self {
            route: Arc::clone(&self.route),
            labels: self.labels.clone(),
            targets: self.targets.clone(),
        }
    }
}

struct PendingBranch<S> {
    from: String,
    route: RouteFn<S>,
    outcomes: Vec<(String, Option<String>)>,
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

pub struct GraphBuilder<S: WorkflowState> {
    name: String,
    nodes: HashMap<String, NodeKind<S>>,
    order: Vec<String>,
    edges: Vec<(String, String)>,
    branches: Vec<PendingBranch<S>>,
    entry: Option<String>,
    interrupt_before: Vec<String>,
    interrupt_after: Vec<String>,
    errors: Vec<GraphDefinitionError>,
}

impl<S: WorkflowState> GraphBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            branches: Vec::new(),
            entry: None,
            interrupt_before: Vec::new(),
            interrupt_after: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Adds a task node.
    pub fn node(self, name: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        self.add(name.into(), NodeKind::Task(Arc::new(node)))
    }

    /// Adds a gate: a no-op node that only exists to carry outgoing edges.
    pub fn gate(self, name: impl Into<String>) -> Self {
        self.add(name.into(), NodeKind::Gate)
    }

    fn add(mut self, name: String, kind: NodeKind<S>) -> Self {
        if self.nodes.contains_key(&name) {
            self.errors.push(GraphDefinitionError::DuplicateNode(name));
            return self;
        }
        self.order.push(name.clone());
        self.nodes.insert(name, kind);
        self
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Unconditional edge. `to` may be `END`.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Conditional edge: `router` picks an outcome, `mapping` resolves it to a
    /// node name or `END`.
    pub fn conditional_edges<O, I, T>(mut self, from: impl Into<String>, router: fn(&S) -> O, mapping: I) -> Self
    where
        O: Outcome,
        I: IntoIterator<Item = (O, T)>,
        T: Into<String>,
    {
        let mapping: Vec<(O, String)> = mapping.into_iter().map(|(o, t)| (o, t.into())).collect();

        let outcomes = O::ALL
            .iter()
            .map(|outcome| {
                let target = mapping
                    .iter()
                    .find(|(o, _)| o == outcome)
                    .map(|(_, t)| t.clone());
                (format!("{outcome:?}"), target)
            })
            .collect();

        let route: RouteFn<S> = Arc::new(move |state: &S| {
            let picked = router(state);
            O::ALL.iter().position(|o| *o == picked)
        });

        self.branches.push(PendingBranch {
            from: from.into(),
            route,
            outcomes,
        });
        self
    }

    /// Suspend before these nodes run.
    pub fn interrupt_before<I, T>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.interrupt_before.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Suspend after these nodes run.
    pub fn interrupt_after<I, T>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.interrupt_after.extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Validates every reference and freezes the graph.
    pub fn build(mut self) -> Result<CompiledGraph<S>, GraphDefinitionError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }

        let entry = self
            .entry
            .ok_or_else(|| GraphDefinitionError::MissingEntry(self.name.clone()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphDefinitionError::UnknownEntry(entry));
        }

        let declared = |name: &str| name == END || self.nodes.contains_key(name);

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in self.edges {
            if !self.nodes.contains_key(&from) {
                return Err(GraphDefinitionError::UnknownSource(from));
            }
            if !declared(&to) {
                return Err(GraphDefinitionError::DanglingEdge { from, to });
            }
            let targets = edges.entry(from).or_default();
            if !targets.contains(&to) {
                targets.push(to);
            }
        }

        let mut branches: HashMap<String, Vec<Branch<S>>> = HashMap::new();
        for pending in self.branches {
            if !self.nodes.contains_key(&pending.from) {
                return Err(GraphDefinitionError::UnknownSource(pending.from));
            }
            let mut labels = Vec::with_capacity(pending.outcomes.len());
            let mut targets = Vec::with_capacity(pending.outcomes.len());
            for (label, target) in pending.outcomes {
                let target = target.ok_or_else(|| GraphDefinitionError::UnmappedOutcome {
                    from: pending.from.clone(),
                    outcome: label.clone(),
                })?;
                if !declared(&target) {
                    return Err(GraphDefinitionError::DanglingEdge {
                        from: pending.from.clone(),
                        to: target,
                    });
                }
                labels.push(label);
                targets.push(target);
            }
            branches.entry(pending.from).or_default().push(Branch {
                route: pending.route,
                labels,
                targets,
            });
        }

        for name in self.interrupt_before.iter().chain(&self.interrupt_after) {
            if !self.nodes.contains_key(name) {
                return Err(GraphDefinitionError::UnknownInterrupt(name.clone()));
            }
        }

        Ok(CompiledGraph {
            name: self.name,
            nodes: self.nodes,
            order: self.order,
            edges,
            branches,
            entry,
            interrupt_before: self.interrupt_before.into_iter().collect(),
            interrupt_after: self.interrupt_after.into_iter().collect(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Compiled graph
// ────────────────────────────────────────────────────────────────────────────

/// Immutable, validated graph. Built once per workflow type and shared by
/// every thread of that workflow.
pub struct CompiledGraph<S: WorkflowState> {
    name: String,
    nodes: HashMap<String, NodeKind<S>>,
    order: Vec<String>,
    edges: HashMap<String, Vec<String>>,
    branches: HashMap<String, Vec<Branch<S>>>,
    entry: String,
    interrupt_before: HashSet<String>,
    interrupt_after: HashSet<String>,
}

impl<S: WorkflowState> CompiledGraph<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Declared node names, in declaration order.
    pub fn node_names(&self) -> &[String] {
        &self.order
    }

    pub fn node(&self, name: &str) -> Option<&NodeKind<S>> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn interrupts_before(&self, name: &str) -> bool {
        self.interrupt_before.contains(name)
    }

    pub fn interrupts_after(&self, name: &str) -> bool {
        self.interrupt_after.contains(name)
    }

    /// Where execution goes after `node`, evaluated against `state`.
    ///
    /// Static targets come first in declaration order, then router picks.
    /// `END` appears in the result when a route terminates.
    pub fn successors(&self, node: &str, state: &S) -> Result<Vec<String>, EngineError> {
        let mut next: Vec<String> = self.edges.get(node).cloned().unwrap_or_default();

        for branch in self.branches.get(node).into_iter().flatten() {
            let idx = (branch.route)(state).ok_or_else(|| EngineError::Unroutable {
                node: node.to_string(),
            })?;
            let target = &branch.targets[idx];
            tracing::debug!(
                "Router on '{}' chose {} -> {}",
                node,
                branch.labels[idx],
                target
            );
            if !next.contains(target) {
                next.push(target.clone());
            }
        }

        Ok(next)
    }
}

impl<S: WorkflowState> std::fmt::Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("nodes", &self.order)
            .field("edges", &self.edges)
            .field("conditional_sources", &self.branches.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Counter, Increment, Parity};

    fn parity_router(state: &Counter) -> Parity {
        if state.count % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    #[test]
    fn test_build_basic_graph() {
        let graph = GraphBuilder::<Counter>::new("basic")
            .node("start", Increment)
            .gate("check")
            .entry("start")
            .edge("start", "check")
            .edge("check", END)
            .build()
            .unwrap();

        assert_eq!(graph.name(), "basic");
        assert_eq!(graph.entry(), "start");
        assert_eq!(graph.node_names(), ["start", "check"]);
        assert!(graph.node("check").unwrap().is_gate());
    }

    #[test]
    fn test_missing_entry_fails() {
        let result = GraphBuilder::<Counter>::new("g").node("a", Increment).build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::MissingEntry("g".to_string())
        );
    }

    #[test]
    fn test_unknown_entry_fails() {
        let result = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .entry("b")
            .build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::UnknownEntry("b".to_string())
        );
    }

    #[test]
    fn test_dangling_edge_fails() {
        let result = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .entry("a")
            .edge("a", "missing")
            .build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::DanglingEdge {
                from: "a".to_string(),
                to: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_edge_from_undeclared_node_fails() {
        let result = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .entry("a")
            .edge("ghost", "a")
            .build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::UnknownSource("ghost".to_string())
        );
    }

    #[test]
    fn test_router_target_must_be_declared() {
        let result = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .entry("a")
            .conditional_edges("a", parity_router, [(Parity::Even, END), (Parity::Odd, "nowhere")])
            .build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::DanglingEdge {
                from: "a".to_string(),
                to: "nowhere".to_string()
            }
        );
    }

    #[test]
    fn test_unmapped_outcome_fails() {
        let result = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .entry("a")
            .conditional_edges("a", parity_router, [(Parity::Even, END)])
            .build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::UnmappedOutcome {
                from: "a".to_string(),
                outcome: "Odd".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_interrupt_fails() {
        let result = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .entry("a")
            .interrupt_after(["b"])
            .build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::UnknownInterrupt("b".to_string())
        );
    }

    #[test]
    fn test_duplicate_node_fails() {
        let result = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .gate("a")
            .entry("a")
            .build();
        assert_eq!(
            result.unwrap_err(),
            GraphDefinitionError::DuplicateNode("a".to_string())
        );
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let graph = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .node("b", Increment)
            .entry("a")
            .edge("a", "b")
            .edge("a", "b")
            .build()
            .unwrap();

        let next = graph.successors("a", &Counter::default()).unwrap();
        assert_eq!(next, vec!["b".to_string()]);
    }

    #[test]
    fn test_successors_follow_router() {
        let graph = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .node("odd", Increment)
            .entry("a")
            .conditional_edges("a", parity_router, [(Parity::Even, END), (Parity::Odd, "odd")])
            .build()
            .unwrap();

        let even = Counter { count: 2, ..Default::default() };
        let odd = Counter { count: 3, ..Default::default() };
        assert_eq!(graph.successors("a", &even).unwrap(), vec![END.to_string()]);
        assert_eq!(graph.successors("a", &odd).unwrap(), vec!["odd".to_string()]);
    }

    #[test]
    fn test_node_without_edges_has_no_successors() {
        let graph = GraphBuilder::<Counter>::new("g")
            .node("a", Increment)
            .entry("a")
            .build()
            .unwrap();
        assert!(graph.successors("a", &Counter::default()).unwrap().is_empty());
    }
}
