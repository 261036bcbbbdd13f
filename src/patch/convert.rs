//! Conversion between live graphs and patch documents.

use std::collections::HashMap;

use log::warn;

use crate::graph::Graph;
use crate::node::NodeId;
use crate::patch::document::{ConnectionData, NodeData, Patch};
use crate::registry::NodeRegistry;

/// What a reconstruction had to leave out
///
/// Reconstruction is best effort: unknown node types are skipped,
/// connections whose endpoints do not resolve (or do not validate) are
/// dropped, and unknown parameter names are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructReport {
    /// Patch node ids whose type could not be constructed
    pub skipped_nodes: Vec<String>,
    /// Patch connection ids that were not recreated
    pub dropped_connections: Vec<String>,
    /// `(patch node id, parameter name)` pairs the node does not have
    pub unknown_parameters: Vec<(String, String)>,
}

impl ReconstructReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_nodes.is_empty()
            && self.dropped_connections.is_empty()
            && self.unknown_parameters.is_empty()
    }
}

/// Build a live graph from a patch
///
/// Every node gets a freshly minted id; the patch's ids only key a local
/// remap table that is discarded afterwards.
pub fn create_graph_from_patch(
    patch: &Patch,
    registry: &NodeRegistry,
) -> (Graph, ReconstructReport) {
    let mut graph = Graph::new(patch.name.clone());
    graph.description = patch.description.clone();
    graph.author = patch.author.clone();

    let mut report = ReconstructReport::default();
    let mut remap: HashMap<&str, NodeId> = HashMap::with_capacity(patch.nodes.len());

    for data in &patch.nodes {
        let mut node = match registry.create(&data.type_name) {
            Ok(node) => node,
            Err(e) => {
                warn!("Patch '{}': skipping node {}: {}", patch.name, data.id, e);
                report.skipped_nodes.push(data.id.clone());
                continue;
            }
        };

        if !data.display_name.is_empty() {
            node.set_display_name(data.display_name.clone());
        }
        node.set_enabled(data.enabled);
        for (name, &value) in &data.parameters {
            if node.set_parameter(name, value).is_err() {
                warn!(
                    "Patch '{}': node {} ({}) has no parameter '{}'",
                    patch.name, data.id, data.type_name, name
                );
                report
                    .unknown_parameters
                    .push((data.id.clone(), name.clone()));
            }
        }

        remap.insert(data.id.as_str(), graph.add_node(node));
    }

    for data in &patch.connections {
        let endpoints = (
            remap.get(data.source_node.as_str()),
            remap.get(data.target_node.as_str()),
        );
        let result = match endpoints {
            (Some(&source), Some(&target)) => graph
                .connect(source, data.source_port, target, data.target_port, data.amount)
                .map_err(|e| e.to_string()),
            _ => Err("endpoint node is missing".to_string()),
        };
        if let Err(reason) = result {
            warn!(
                "Patch '{}': dropping connection {}: {}",
                patch.name, data.id, reason
            );
            report.dropped_connections.push(data.id.clone());
        }
    }

    (graph, report)
}

/// Snapshot a live graph as a new patch document
///
/// The patch gets a fresh document id; node and connection ids are the
/// graph's live ids rendered as strings.
pub fn create_patch_from_graph(graph: &Graph) -> Patch {
    let mut patch = Patch::new(graph.name.clone()).with_description(graph.description.clone());
    patch.author = graph.author.clone();

    patch.nodes = graph
        .nodes()
        .map(|node| NodeData {
            id: node.id().to_string(),
            type_name: node.type_name().to_string(),
            display_name: node.display_name().to_string(),
            enabled: node.is_enabled(),
            parameters: node
                .parameters()
                .map(|p| (p.name().to_string(), p.value()))
                .collect(),
        })
        .collect();

    patch.connections = graph
        .connections()
        .iter()
        .map(|c| ConnectionData {
            id: c.id.to_string(),
            source_node: c.source.to_string(),
            source_port: c.source_port,
            target_node: c.target.to_string(),
            target_port: c.target_port,
            amount: c.amount,
        })
        .collect();

    patch
}
