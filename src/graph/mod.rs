//! Node graph
//!
//! A graph owns its nodes and the connections between their ports. Every
//! topology change recomputes an evaluation plan (dependency order plus the
//! routes feeding each node), so `process` itself only walks precomputed
//! indices.
//!
//! Processing one block:
//! 1. For each node in dependency order, every connected input port is set
//!    to the sum of its sources' output values, each scaled by the
//!    connection amount. Unconnected inputs keep whatever was last written.
//! 2. The node processes the shared mono buffer in place.

mod connection;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use log::warn;

use crate::error::{PatchcordError, Result};
use crate::node::{Node, NodeId, PortDirection};

pub use connection::{Connection, ConnectionId};

/// One source feeding an input port
#[derive(Debug, Clone, Copy)]
struct Feed {
    source: usize,
    source_port: usize,
    amount: f32,
}

/// All feeds into one input port
#[derive(Debug, Clone)]
struct Route {
    port: usize,
    feeds: Vec<Feed>,
}

/// A node to evaluate and the routes to gather first
#[derive(Debug, Clone)]
struct Step {
    node: usize,
    routes: Vec<Route>,
}

/// A mutable set of nodes and connections with a deterministic evaluation order
#[derive(Debug, Default)]
pub struct Graph {
    pub name: String,
    pub description: String,
    pub author: String,
    /// Insertion order
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    connections: Vec<Connection>,
    plan: Vec<Step>,
}

impl Graph {
    /// Create an empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node; returns its id
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.index.insert(id, self.nodes.len());
        self.nodes.push(node);
        self.rebuild_plan();
        id
    }

    /// Remove a node and every connection touching it
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let position = self.position(id)?;
        let node = self.nodes.remove(position);
        self.connections.retain(|c| !c.touches(id));
        self.reindex();
        self.rebuild_plan();
        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.nodes[i]),
            None => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// First node of the given type, in insertion order
    pub fn find_by_type(&self, type_name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.type_name() == type_name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Set a named parameter on a node (clamped); returns the stored value
    pub fn set_parameter(&mut self, id: NodeId, name: &str, value: f32) -> Result<f32> {
        self.require_mut(id)?.set_parameter(name, value)
    }

    /// Write an input port directly
    ///
    /// A connected input is overwritten by its sources on the next block.
    pub fn set_input(&mut self, id: NodeId, port: usize, value: f32) -> Result<()> {
        self.require_mut(id)?.set_input(port, value)
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect an output port to an input port
    ///
    /// Checks that both nodes and ports exist, that the port kinds are
    /// plausible, and that the same pair of ports is not already joined.
    /// Cycles are not rejected here; see [`Graph::evaluation_order`].
    pub fn connect(
        &mut self,
        source: NodeId,
        source_port: usize,
        target: NodeId,
        target_port: usize,
        amount: f32,
    ) -> Result<ConnectionId> {
        if source == target {
            return Err(PatchcordError::SelfConnection {
                node_id: source.to_string(),
            });
        }
        let source_node = self.require(source)?;
        let target_node = self.require(target)?;

        let source_kind = source_node
            .outputs()
            .get(source_port)
            .map(|p| p.kind())
            .ok_or_else(|| PatchcordError::PortOutOfRange {
                node: source_node.display_name().to_string(),
                direction: PortDirection::Output.as_str(),
                index: source_port,
            })?;
        let target_kind = target_node
            .inputs()
            .get(target_port)
            .map(|p| p.kind())
            .ok_or_else(|| PatchcordError::PortOutOfRange {
                node: target_node.display_name().to_string(),
                direction: PortDirection::Input.as_str(),
                index: target_port,
            })?;
        if !target_kind.accepts(source_kind) {
            return Err(PatchcordError::IncompatiblePorts {
                source_kind: source_kind.as_str(),
                target_kind: target_kind.as_str(),
            });
        }

        let connection = Connection {
            id: ConnectionId::new(),
            source,
            source_port,
            target,
            target_port,
            amount: if amount.is_finite() { amount } else { 1.0 },
        };
        if self.connections.iter().any(|c| c.same_endpoints(&connection)) {
            return Err(PatchcordError::DuplicateConnection);
        }

        let id = connection.id;
        self.connections.push(connection);
        self.rebuild_plan();
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<Connection> {
        let position = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| PatchcordError::ConnectionNotFound {
                connection_id: id.to_string(),
            })?;
        let connection = self.connections.remove(position);
        self.rebuild_plan();
        Ok(connection)
    }

    /// Change the gain of an existing connection
    pub fn set_connection_amount(&mut self, id: ConnectionId, amount: f32) -> Result<()> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| PatchcordError::ConnectionNotFound {
                connection_id: id.to_string(),
            })?;
        if amount.is_finite() {
            connection.amount = amount;
        }
        self.rebuild_plan();
        Ok(())
    }

    /// Connections in creation order
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    /// Node ids in the order `process` visits them
    pub fn evaluation_order(&self) -> Vec<NodeId> {
        self.plan.iter().map(|s| self.nodes[s.node].id()).collect()
    }

    /// Prepare every node for `sample_rate`
    pub fn prepare(&mut self, sample_rate: f32) {
        for node in &mut self.nodes {
            node.prepare(sample_rate);
        }
    }

    /// Clear DSP memory and port values of every node
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.reset();
        }
    }

    /// Process one block through every node in dependency order
    pub fn process(&mut self, buffer: &mut [f32], sample_count: usize, sample_rate: f32) {
        let count = sample_count.min(buffer.len());
        if count == 0 {
            return;
        }

        for step in &self.plan {
            for route in &step.routes {
                let value: f32 = route
                    .feeds
                    .iter()
                    .map(|f| {
                        self.nodes[f.source]
                            .output_value(f.source_port)
                            .unwrap_or(0.0)
                            * f.amount
                    })
                    .sum();
                // Ports were validated when the plan was built
                let _ = self.nodes[step.node].set_input(route.port, value);
            }
            self.nodes[step.node].process(buffer, count, sample_rate);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn position(&self, id: NodeId) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| PatchcordError::NodeNotFound {
                node_id: id.to_string(),
            })
    }

    fn require(&self, id: NodeId) -> Result<&Node> {
        self.position(id).map(|i| &self.nodes[i])
    }

    fn require_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let i = self.position(id)?;
        Ok(&mut self.nodes[i])
    }

    fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id(), i))
            .collect();
    }

    /// Kahn's algorithm over node indices, ready nodes taken in insertion
    /// order; nodes left in a cycle run last, also in insertion order
    fn rebuild_plan(&mut self) {
        let count = self.nodes.len();
        let mut in_degree = vec![0_usize; count];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut routes: Vec<Vec<Route>> = vec![Vec::new(); count];

        for connection in &self.connections {
            let (Some(&source), Some(&target)) = (
                self.index.get(&connection.source),
                self.index.get(&connection.target),
            ) else {
                continue;
            };

            let feed = Feed {
                source,
                source_port: connection.source_port,
                amount: connection.amount,
            };
            match routes[target]
                .iter_mut()
                .find(|r| r.port == connection.target_port)
            {
                Some(route) => route.feeds.push(feed),
                None => routes[target].push(Route {
                    port: connection.target_port,
                    feeds: vec![feed],
                }),
            }

            if !successors[source].contains(&target) {
                successors[source].push(target);
                in_degree[target] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
            .filter(|&i| in_degree[i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(count);
        let mut visited = vec![false; count];
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            visited[i] = true;
            for &next in &successors[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < count {
            let cyclic: Vec<usize> = (0..count).filter(|&i| !visited[i]).collect();
            warn!(
                "Graph '{}': {} node(s) are part of a cycle and run after the rest: {}",
                self.name,
                cyclic.len(),
                cyclic
                    .iter()
                    .map(|&i| self.nodes[i].display_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            order.extend(cyclic);
        }

        self.plan = order
            .into_iter()
            .map(|node| Step {
                node,
                routes: std::mem::take(&mut routes[node]),
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};
    use crate::registry::NodeRegistry;
    use approx::assert_relative_eq;

    /// Publishes its "Value" parameter on a control output
    struct Constant;

    impl Processor for Constant {
        fn type_name(&self) -> &'static str {
            "Constant"
        }

        fn initialize_ports(&self, ports: &mut PortLayout) {
            ports.output("Out", PortKind::Control);
        }

        fn initialize_parameters(&self, params: &mut ParameterSet) {
            params.add(Parameter::new("Value", 0.0, -10.0, 10.0, ""));
        }

        fn process(&mut self, ctx: &mut ProcessContext<'_>, _buffer: &mut [f32]) {
            let value = ctx.param(0);
            ctx.set_output(0, value);
        }
    }

    /// Copies its control input to its output and adds it to the buffer
    struct Probe;

    impl Processor for Probe {
        fn type_name(&self) -> &'static str {
            "Probe"
        }

        fn initialize_ports(&self, ports: &mut PortLayout) {
            ports
                .input("In", PortKind::Control)
                .output("Out", PortKind::Control);
        }

        fn initialize_parameters(&self, _params: &mut ParameterSet) {}

        fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
            let value = ctx.input(0);
            buffer.iter_mut().for_each(|s| *s += value);
            ctx.set_output(0, value);
        }
    }

    fn constant(value: f32) -> Node {
        let mut node = Node::from_processor(Constant);
        node.set_parameter("Value", value).unwrap();
        node
    }

    #[test]
    fn test_order_follows_dependencies() {
        let mut graph = Graph::new("order");
        let probe = graph.add_node(Node::from_processor(Probe));
        let source = graph.add_node(constant(1.0));
        graph.connect(source, 0, probe, 0, 1.0).unwrap();
        assert_eq!(graph.evaluation_order(), vec![source, probe]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut graph = Graph::new("ties");
        let a = graph.add_node(constant(1.0));
        let b = graph.add_node(constant(2.0));
        let c = graph.add_node(Node::from_processor(Probe));
        assert_eq!(graph.evaluation_order(), vec![a, b, c]);
    }

    #[test]
    fn test_inputs_sum_scaled_sources() {
        let mut graph = Graph::new("sum");
        let a = graph.add_node(constant(1.0));
        let b = graph.add_node(constant(3.0));
        let probe = graph.add_node(Node::from_processor(Probe));
        graph.connect(a, 0, probe, 0, 1.0).unwrap();
        graph.connect(b, 0, probe, 0, 0.5).unwrap();

        let mut buffer = [0.0_f32; 4];
        graph.process(&mut buffer, 4, 48000.0);
        assert_relative_eq!(graph.node(probe).unwrap().output_value(0).unwrap(), 2.5);
        assert_eq!(buffer, [2.5; 4]);
    }

    #[test]
    fn test_unconnected_input_keeps_last_value() {
        let mut graph = Graph::new("host");
        let probe = graph.add_node(Node::from_processor(Probe));
        graph.set_input(probe, 0, 0.75).unwrap();
        let mut buffer = [0.0_f32; 2];
        graph.process(&mut buffer, 2, 48000.0);
        graph.process(&mut buffer, 2, 48000.0);
        assert_eq!(buffer, [1.5; 2]);
    }

    #[test]
    fn test_remove_node_drops_its_connections() {
        let mut graph = Graph::new("remove");
        let a = graph.add_node(constant(1.0));
        let probe = graph.add_node(Node::from_processor(Probe));
        let b = graph.add_node(constant(2.0));
        graph.connect(a, 0, probe, 0, 1.0).unwrap();
        graph.connect(b, 0, probe, 0, 1.0).unwrap();

        graph.remove_node(a).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.connections().len(), 1);
        assert!(graph.connections().iter().all(|c| !c.touches(a)));
        assert!(graph.node(b).is_some());

        let mut buffer = [0.0_f32; 1];
        graph.process(&mut buffer, 1, 48000.0);
        assert_eq!(graph.node(probe).unwrap().output_value(0), Some(2.0));
    }

    #[test]
    fn test_connect_validation() {
        let mut graph = Graph::new("validate");
        let a = graph.add_node(constant(1.0));
        let probe = graph.add_node(Node::from_processor(Probe));
        let stray = NodeId::new();

        let code = |r: Result<ConnectionId>| r.unwrap_err().error_code();
        assert_eq!(code(graph.connect(a, 0, a, 0, 1.0)), "SELF_CONNECTION");
        assert_eq!(code(graph.connect(stray, 0, probe, 0, 1.0)), "NODE_NOT_FOUND");
        assert_eq!(code(graph.connect(a, 3, probe, 0, 1.0)), "PORT_OUT_OF_RANGE");
        assert_eq!(code(graph.connect(a, 0, probe, 1, 1.0)), "PORT_OUT_OF_RANGE");

        graph.connect(a, 0, probe, 0, 1.0).unwrap();
        assert_eq!(code(graph.connect(a, 0, probe, 0, 0.5)), "DUPLICATE_CONNECTION");
    }

    #[test]
    fn test_audio_cannot_drive_a_gate() {
        let registry = NodeRegistry::with_defaults();
        let mut graph = Graph::new("kinds");
        let osc = graph.add_node(registry.create("Oscillator").unwrap());
        let env = graph.add_node(registry.create("Envelope").unwrap());
        let err = graph.connect(osc, 0, env, 0, 1.0).unwrap_err();
        assert_eq!(err.error_code(), "INCOMPATIBLE_PORTS");
    }

    #[test]
    fn test_disconnect() {
        let mut graph = Graph::new("disconnect");
        let a = graph.add_node(constant(1.0));
        let probe = graph.add_node(Node::from_processor(Probe));
        let id = graph.connect(a, 0, probe, 0, 1.0).unwrap();
        assert_eq!(graph.disconnect(id).unwrap().source, a);
        assert!(graph.connections().is_empty());
        assert_eq!(
            graph.disconnect(id).unwrap_err().error_code(),
            "CONNECTION_NOT_FOUND"
        );
    }

    #[test]
    fn test_cycle_runs_every_node() {
        let mut graph = Graph::new("cycle");
        let a = graph.add_node(Node::from_processor(Probe));
        let b = graph.add_node(Node::from_processor(Probe));
        let c = graph.add_node(constant(1.0));
        graph.connect(a, 0, b, 0, 1.0).unwrap();
        graph.connect(b, 0, a, 0, 1.0).unwrap();
        assert_eq!(graph.evaluation_order(), vec![c, a, b]);

        let mut buffer = [0.0_f32; 1];
        graph.process(&mut buffer, 1, 48000.0);
        assert!(buffer[0].is_finite());
    }

    #[test]
    fn test_empty_block_is_noop() {
        let mut graph = Graph::new("empty");
        let probe = graph.add_node(Node::from_processor(Probe));
        graph.set_input(probe, 0, 1.0).unwrap();
        let mut buffer = [0.0_f32; 4];
        graph.process(&mut buffer, 0, 48000.0);
        graph.process(&mut [], 16, 48000.0);
        assert_eq!(buffer, [0.0; 4]);

        graph.process(&mut buffer, 16, 48000.0);
        assert_eq!(buffer, [1.0; 4]);
    }

    #[test]
    fn test_set_parameter_by_node() {
        let mut graph = Graph::new("params");
        let a = graph.add_node(constant(0.0));
        assert_eq!(graph.set_parameter(a, "Value", 20.0).unwrap(), 10.0);
        assert_eq!(
            graph
                .set_parameter(NodeId::new(), "Value", 1.0)
                .unwrap_err()
                .error_code(),
            "NODE_NOT_FOUND"
        );
    }
}
