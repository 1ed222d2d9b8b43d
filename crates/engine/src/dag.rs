//! DAG scheduling: validate a workflow graph and derive its execution order.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference declared node IDs (both `source` and `target`).
//! 3. The directed graph must be acyclic (topological sort must succeed).
//!
//! Duplicate edges are collapsed to their first occurrence. Ties between
//! ready nodes are broken by declaration order, so the same definition always
//! yields the same order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    models::{Edge, NodeDefinition, WorkflowDefinition},
    EngineError,
};

/// Validate the workflow's DAG and return nodes in topological execution order.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_dag(workflow: &WorkflowDefinition) -> Result<Vec<String>, EngineError> {
    execution_order(&workflow.nodes, &workflow.edges)
}

/// Same as [`validate_dag`], over borrowed node and edge lists.
pub fn execution_order(nodes: &[NodeDefinition], edges: &[Edge]) -> Result<Vec<String>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut node_set: HashSet<&str> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !node_set.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints
    // -----------------------------------------------------------------------
    for edge in edges {
        if !node_set.contains(edge.source.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if !node_set.contains(edge.target.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::with_capacity(nodes.len());
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for (source, target) in unique_edges(edges) {
        adjacency.entry(source).or_default().push(target);
        *in_degree.entry(target).or_insert(0) += 1;
    }

    // Seed the queue with nodes that have no incoming edges, in declaration order.
    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(nodes.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                if let Some(deg) = in_degree.get_mut(neighbour) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(neighbour);
                    }
                }
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if sorted.len() != nodes.len() {
        let visited: HashSet<&str> = sorted.iter().map(String::as_str).collect();
        let remaining = nodes
            .iter()
            .filter(|n| !visited.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        return Err(EngineError::CycleDetected { remaining });
    }

    Ok(sorted)
}

/// For every node with upstream edges, its distinct sources in edge
/// declaration order. This is the order a node's `inputs` are assembled in.
pub fn incoming_sources(workflow: &WorkflowDefinition) -> HashMap<&str, Vec<&str>> {
    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    for (source, target) in unique_edges(&workflow.edges) {
        incoming.entry(target).or_default().push(source);
    }
    incoming
}

fn unique_edges(edges: &[Edge]) -> impl Iterator<Item = (&str, &str)> {
    let mut seen: HashSet<(&str, &str)> = HashSet::with_capacity(edges.len());
    edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .filter(move |pair| seen.insert(*pair))
}
