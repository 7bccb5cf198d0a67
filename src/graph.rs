//! Dependency graph checking
//!
//! Before any instantiation side effect, resolution walks the declared
//! dependency edges of the requested key and fails on the first cycle. The
//! graph is rebuilt from scratch on every call: dependency sets are small,
//! and a stale incremental graph would be worse than the rebuild.
//!
//! Only constructor and factory parameters contribute edges. Property
//! injections are deliberately absent: a property cycle is legal at the
//! value level because the dependent instance is cached before its
//! properties resolve.

use crate::container::InjectContainer;
use crate::error::{InjectError, Result};
use crate::key::Key;
use crate::metadata::ParamSpec;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Walk the dependency graph rooted at `root`, failing on any cycle.
pub(crate) fn check_dependencies(container: &InjectContainer, root: &Key) -> Result<()> {
    let mut checker = Checker {
        container,
        graph: DiGraph::new(),
        indices: HashMap::new(),
        expanded: HashSet::new(),
        names: HashMap::new(),
        anonymous: 0,
    };
    checker.visit(root.clone())
}

struct Checker<'a> {
    container: &'a InjectContainer,
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    expanded: HashSet<Key>,
    /// Names are scoped to one check invocation; synthesized placeholders
    /// must not leak between calls.
    names: HashMap<Key, String>,
    anonymous: usize,
}

impl Checker<'_> {
    fn visit(&mut self, key: Key) -> Result<()> {
        if !self.expanded.insert(key.clone()) {
            return Ok(());
        }

        let from = self.name_of(&key);
        for param in self.dependencies_of(&key) {
            // lazy references are unwrapped before naming and insertion
            let dependency = param.key.unwrap_key();
            let to = self.name_of(&dependency);

            let a = self.node(&from);
            let b = self.node(&to);
            self.graph.update_edge(a, b, ());

            let cycles = self.cycles();
            if !cycles.is_empty() {
                return Err(InjectError::CircularDependency { cycles });
            }

            self.visit(dependency)?;
        }
        Ok(())
    }

    /// Declared dependency edges of a key: a registered provider's factory
    /// params when one exists anywhere in the container chain, else the
    /// type descriptor's constructor params, else nothing.
    fn dependencies_of(&self, key: &Key) -> Vec<ParamSpec> {
        let mut params = if let Some(provider) = self.container.provider_lookup(key) {
            provider.params()
        } else if let Some(spec) = self.container.metadata().spec(key) {
            spec.params().to_vec()
        } else {
            return Vec::new();
        };
        params.sort_by_key(|param| param.index);
        params
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(index) = self.indices.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), index);
        index
    }

    fn name_of(&mut self, key: &Key) -> String {
        if let Some(name) = self.names.get(key) {
            return name.clone();
        }
        let display = key.display_name();
        let name = if display.is_empty() {
            let placeholder = format!("anonymous#{}", self.anonymous);
            self.anonymous += 1;
            placeholder
        } else {
            display.to_string()
        };
        self.names.insert(key.clone(), name.clone());
        name
    }

    /// Every cycle in the graph-so-far: Tarjan components of more than one
    /// node, plus single nodes with a self edge.
    fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self.graph.find_edge(component[0], component[0]).is_some()
            })
            .map(|component| {
                component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect()
            })
            .collect()
    }
}
