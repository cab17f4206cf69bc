//! Capability registry for the message bus.
//!
//! Components declare which data they provide (capabilities), which data they need from other
//! components (dependencies) and which data they accept from outside (inputs). The registry
//! resolves the provider of a datum and orders components so that every provider is prepared
//! before its dependents.

use crate::biome::split_biome_name;
use crate::errors::{NboxError, NboxResult};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dependency graph with components as nodes and an edge from each provider to its dependents
type DependencyGraph = Graph<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    /// Component names in registration order
    components: Vec<String>,
    /// datum -> providing component
    capabilities: BTreeMap<String, String>,
    /// datum -> component accepting it as an input
    inputs: BTreeMap<String, String>,
    /// (component, datum it depends on)
    dependencies: Vec<(String, String)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component by name
    pub fn register_component(&mut self, component: &str) -> NboxResult<()> {
        if self.components.iter().any(|c| c == component) {
            return Err(NboxError::Error(format!(
                "Component '{}' is already registered",
                component
            )));
        }
        self.components.push(component.to_string());
        Ok(())
    }

    pub fn register_capability(&mut self, capability: &str, component: &str) -> NboxResult<()> {
        if let Some(existing) = self.capabilities.get(capability) {
            return Err(NboxError::DuplicateCapability {
                capability: capability.to_string(),
                existing: existing.clone(),
                requested: component.to_string(),
            });
        }
        log::debug!("{} provides {}", component, capability);
        self.capabilities
            .insert(capability.to_string(), component.to_string());
        Ok(())
    }

    pub fn register_dependency(&mut self, capability: &str, component: &str) {
        log::debug!("{} depends on {}", component, capability);
        self.dependencies
            .push((component.to_string(), capability.to_string()));
    }

    pub fn register_input(&mut self, input: &str, component: &str) -> NboxResult<()> {
        if let Some(existing) = self.inputs.get(input) {
            if existing != component {
                return Err(NboxError::DuplicateCapability {
                    capability: input.to_string(),
                    existing: existing.clone(),
                    requested: component.to_string(),
                });
            }
        }
        self.inputs.insert(input.to_string(), component.to_string());
        Ok(())
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Name of the component providing `datum`
    ///
    /// Biome-qualified names resolve to the provider of the unqualified datum.
    pub fn provider(&self, datum: &str) -> NboxResult<&str> {
        let (_, name) = split_biome_name(datum)?;
        self.capabilities
            .get(name)
            .map(|c| c.as_str())
            .ok_or_else(|| NboxError::UnknownDatum(datum.to_string()))
    }

    /// Name of the component accepting `datum` as an input
    pub fn input_handler(&self, datum: &str) -> NboxResult<&str> {
        let (_, name) = split_biome_name(datum)?;
        self.inputs
            .get(name)
            .map(|c| c.as_str())
            .ok_or_else(|| NboxError::UnknownDatum(datum.to_string()))
    }

    fn build_graph(&self) -> NboxResult<(DependencyGraph, BTreeMap<&str, NodeIndex>)> {
        let mut graph = DependencyGraph::new();
        let mut nodes = BTreeMap::new();
        for component in &self.components {
            nodes.insert(component.as_str(), graph.add_node(component.clone()));
        }

        for (component, capability) in &self.dependencies {
            let provider = self.provider(capability)?;
            if provider == component {
                // Self-referential dependencies do not constrain ordering
                continue;
            }
            let from = nodes
                .get(provider)
                .ok_or_else(|| NboxError::UnknownDatum(capability.clone()))?;
            let to = nodes
                .get(component.as_str())
                .ok_or_else(|| NboxError::Error(format!("Unknown component '{}'", component)))?;
            graph.add_edge(*from, *to, capability.clone());
        }
        Ok((graph, nodes))
    }

    /// Components ordered so that each provider precedes the components depending on it
    pub fn init_order(&self) -> NboxResult<Vec<String>> {
        let (graph, _) = self.build_graph()?;
        let order = toposort(&graph, None).map_err(|cycle| {
            NboxError::CircularDependency(graph[cycle.node_id()].clone())
        })?;
        Ok(order.into_iter().map(|idx| graph[idx].clone()).collect())
    }
}
