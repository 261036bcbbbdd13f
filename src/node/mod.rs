//! Node contract
//!
//! A node is one DSP unit with a fixed set of typed ports and named
//! parameters. The algorithm lives behind the flat [`Processor`] trait;
//! [`Node`] wraps a processor with identity, port values and parameter
//! storage, and is what graphs and patches handle.
//!
//! # Processing model
//!
//! `Node::process(buffer, sample_count, sample_rate)` is called once per
//! block. The caller's `buffer` is a shared mono scratch path: sources
//! overwrite it, processors transform it in place, control nodes leave it
//! alone. Output ports hold the last value of the block. There is no error
//! channel: processors clamp their own parameters and denominators.

mod parameter;
mod port;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PatchcordError, Result};

pub use parameter::{Parameter, ParameterScale, ParameterSet};
pub use port::{is_high, EdgeDetector, Port, PortDirection, PortKind, PortLayout, GATE_THRESHOLD};

/// Process-unique node identifier (minted at construction)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Mint a fresh identifier
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }

    /// Parse a previously formatted identifier
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(NodeId)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-call view a processor gets of its node's ports and parameters
pub struct ProcessContext<'a> {
    inputs: &'a [Port],
    outputs: &'a mut [Port],
    params: &'a ParameterSet,
    sample_rate: f32,
}

impl<'a> ProcessContext<'a> {
    /// Current value of an input port (0.0 for an unknown index)
    #[inline]
    pub fn input(&self, idx: usize) -> f32 {
        self.inputs.get(idx).map_or(0.0, Port::value)
    }

    /// Current value of a parameter
    #[inline]
    pub fn param(&self, idx: usize) -> f32 {
        self.params.value(idx)
    }

    /// Parameter value rounded to the nearest integer (for stepped choices)
    #[inline]
    pub fn param_choice(&self, idx: usize) -> usize {
        self.params.value(idx).round().max(0.0) as usize
    }

    /// Write an output port
    #[inline]
    pub fn set_output(&mut self, idx: usize, value: f32) {
        if let Some(port) = self.outputs.get_mut(idx) {
            port.set_value(value);
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

/// The capability every node type implements
///
/// `initialize_ports` and `initialize_parameters` run exactly once when the
/// owning [`Node`] is built; their declaration order defines port and
/// parameter indices.
pub trait Processor: Send {
    /// Registry type name, e.g. `"Oscillator"`
    fn type_name(&self) -> &'static str;

    /// Declare the fixed port shape
    fn initialize_ports(&self, ports: &mut PortLayout);

    /// Declare the fixed parameter list
    fn initialize_parameters(&self, params: &mut ParameterSet);

    /// (Re)allocate sample-rate dependent state
    ///
    /// Called before the first block and whenever the sample rate changes.
    fn prepare(&mut self, _sample_rate: f32) {}

    /// Process one block in place
    ///
    /// `buffer` is never empty and must not be retained.
    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]);

    /// Clear DSP memory (delay lines, filter history, envelope stage)
    fn reset(&mut self) {}
}

/// A processor plus its identity, ports and parameters
pub struct Node {
    id: NodeId,
    type_name: &'static str,
    display_name: String,
    enabled: bool,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    params: ParameterSet,
    prepared_rate: Option<f32>,
    processor: Box<dyn Processor>,
}

impl Node {
    /// Build a node around a boxed processor
    pub fn new(processor: Box<dyn Processor>) -> Self {
        let mut layout = PortLayout::default();
        processor.initialize_ports(&mut layout);
        let (inputs, outputs) = layout.into_parts();

        let mut params = ParameterSet::default();
        processor.initialize_parameters(&mut params);

        let type_name = processor.type_name();
        Self {
            id: NodeId::new(),
            type_name,
            display_name: type_name.to_string(),
            enabled: true,
            inputs,
            outputs,
            params,
            prepared_rate: None,
            processor,
        }
    }

    /// Build a node from a concrete processor
    pub fn from_processor<P: Processor + 'static>(processor: P) -> Self {
        Self::new(Box::new(processor))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or bypass the node
    ///
    /// A bypassed node leaves the buffer untouched and its outputs keep
    /// their last values.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    // ------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------

    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name() == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name() == name)
    }

    pub fn input_value(&self, idx: usize) -> Option<f32> {
        self.inputs.get(idx).map(Port::value)
    }

    pub fn output_value(&self, idx: usize) -> Option<f32> {
        self.outputs.get(idx).map(Port::value)
    }

    /// Write an input port directly (host-driven or graph routing)
    pub fn set_input(&mut self, idx: usize, value: f32) -> Result<()> {
        match self.inputs.get_mut(idx) {
            Some(port) => {
                port.set_value(value);
                Ok(())
            }
            None => Err(PatchcordError::PortOutOfRange {
                node: self.display_name.clone(),
                direction: PortDirection::Input.as_str(),
                index: idx,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn parameter_info(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    /// Current value of a named parameter
    pub fn parameter(&self, name: &str) -> Result<f32> {
        self.params
            .get(name)
            .map(Parameter::value)
            .ok_or_else(|| self.unknown_parameter(name))
    }

    /// Set a named parameter (clamped); returns the stored value
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Result<f32> {
        match self.params.get_mut(name) {
            Some(param) => Ok(param.set_value(value)),
            None => Err(self.unknown_parameter(name)),
        }
    }

    fn unknown_parameter(&self, name: &str) -> PatchcordError {
        PatchcordError::UnknownParameter {
            node: self.display_name.clone(),
            name: name.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    /// Allocate sample-rate dependent state ahead of the first block
    pub fn prepare(&mut self, sample_rate: f32) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.processor.prepare(sample_rate);
            self.prepared_rate = Some(sample_rate);
        }
    }

    /// Clear DSP memory and port values
    pub fn reset(&mut self) {
        self.processor.reset();
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            port.set_value(0.0);
        }
    }

    /// Process one block
    ///
    /// Only the first `sample_count` samples of `buffer` are touched. Empty
    /// blocks, invalid sample rates and bypassed nodes are no-ops.
    pub fn process(&mut self, buffer: &mut [f32], sample_count: usize, sample_rate: f32) {
        let count = sample_count.min(buffer.len());
        if count == 0 || !self.enabled || !sample_rate.is_finite() || sample_rate <= 0.0 {
            return;
        }
        if self.prepared_rate != Some(sample_rate) {
            self.prepare(sample_rate);
        }

        let mut ctx = ProcessContext {
            inputs: &self.inputs,
            outputs: &mut self.outputs,
            params: &self.params,
            sample_rate,
        };
        self.processor.process(&mut ctx, &mut buffer[..count]);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("display_name", &self.display_name)
            .field("enabled", &self.enabled)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("parameters", &self.params.len())
            .finish()
    }
}
