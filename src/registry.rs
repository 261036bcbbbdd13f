//! Node registry
//!
//! Maps a node type name to a constructor and carries the catalog metadata
//! (display name, category, one-line description) a node palette shows.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::{PatchcordError, Result};
use crate::node::{Node, Processor};
use crate::nodes;

/// Palette grouping of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeCategory {
    Io,
    Utility,
    Source,
    Modulation,
    Filter,
    Dynamics,
    Distortion,
    TimeBased,
    Envelope,
    Sequencing,
    Analysis,
}

impl NodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeCategory::Io => "I/O",
            NodeCategory::Utility => "Utility",
            NodeCategory::Source => "Source",
            NodeCategory::Modulation => "Modulation",
            NodeCategory::Filter => "Filter",
            NodeCategory::Dynamics => "Dynamics",
            NodeCategory::Distortion => "Distortion",
            NodeCategory::TimeBased => "Time-based",
            NodeCategory::Envelope => "Envelope",
            NodeCategory::Sequencing => "Sequencing",
            NodeCategory::Analysis => "Analysis",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds a default-configured processor
pub type NodeConstructor = fn() -> Box<dyn Processor>;

/// Catalog entry for one node type
#[derive(Debug, Clone, Serialize)]
pub struct NodeDescriptor {
    pub type_name: &'static str,
    pub display_name: &'static str,
    pub category: NodeCategory,
    pub description: &'static str,
}

struct Entry {
    descriptor: NodeDescriptor,
    constructor: NodeConstructor,
}

/// Registry of constructible node types
pub struct NodeRegistry {
    entries: HashMap<&'static str, Entry>,
    /// Registration order, for stable listings
    order: Vec<&'static str>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Create a registry holding the whole built-in catalog
    pub fn with_defaults() -> Self {
        use NodeCategory::*;

        let mut registry = Self::new();
        let mut add = |type_name: &'static str,
                       display_name: &'static str,
                       category: NodeCategory,
                       description: &'static str,
                       constructor: NodeConstructor| {
            registry.register(
                NodeDescriptor {
                    type_name,
                    display_name,
                    category,
                    description,
                },
                constructor,
            )
        };

        add("AudioInput", "Audio Input", Io, "Host audio entering the graph", || {
            Box::new(nodes::AudioInput)
        });
        add("AudioOutput", "Audio Output", Io, "Master volume and peak meter", || {
            Box::new(nodes::AudioOutput)
        });
        add("Gain", "Gain", Utility, "Smoothed gain stage in decibels", || {
            Box::new(nodes::Gain::new())
        });
        add("VCA", "VCA", Utility, "Control-driven linear amplifier", || {
            Box::new(nodes::Vca::default())
        });
        add(
            "Oscillator",
            "Oscillator",
            Source,
            "Band-limited sine, saw, square and triangle",
            || Box::new(nodes::Oscillator::new()),
        );
        add("LFO", "LFO", Modulation, "Low-frequency modulation source", || {
            Box::new(nodes::Lfo::default())
        });
        add(
            "LadderFilter",
            "Ladder Filter",
            Filter,
            "Four-pole resonant filter with LP/BP/HP taps",
            || Box::new(nodes::LadderFilter::default()),
        );
        add(
            "ParametricEQ",
            "Parametric EQ",
            Filter,
            "Low shelf, peaking mid and high shelf",
            || Box::new(nodes::ParametricEq::default()),
        );
        add(
            "Compressor",
            "Compressor",
            Dynamics,
            "Soft-knee compressor with RMS detection and look-ahead",
            || Box::new(nodes::Compressor::default()),
        );
        add("Limiter", "Limiter", Dynamics, "Brick-wall peak limiter", || {
            Box::new(nodes::Limiter::default())
        });
        add("Gate", "Noise Gate", Dynamics, "Gate with hysteresis and hold", || {
            Box::new(nodes::Gate::new())
        });
        add(
            "Distortion",
            "Distortion",
            Distortion,
            "Tape, tube, transistor and hard-clip waveshaping",
            || Box::new(nodes::Distortion),
        );
        add("Delay", "Delay", TimeBased, "Feedback delay with a damped repeat path", || {
            Box::new(nodes::Delay::default())
        });
        add("Reverb", "Reverb", TimeBased, "Comb and allpass room reverb", || {
            Box::new(nodes::Reverb::default())
        });
        add("Chorus", "Chorus", Modulation, "LFO-swept short delay", || {
            Box::new(nodes::Chorus::new())
        });
        add("Flanger", "Flanger", Modulation, "Swept comb filter with feedback", || {
            Box::new(nodes::Flanger::new())
        });
        add("Phaser", "Phaser", Modulation, "Swept allpass cascade", || {
            Box::new(nodes::Phaser::default())
        });
        add("Envelope", "ADSR Envelope", Envelope, "Gate-driven ADSR control source", || {
            Box::new(nodes::Envelope::new())
        });
        add(
            "Quantizer",
            "Quantizer",
            Sequencing,
            "Snaps V/oct control to a musical scale",
            || Box::new(nodes::Quantizer::default()),
        );
        add("Clock", "Clock", Sequencing, "Tempo clock with swing", || {
            Box::new(nodes::Clock::default())
        });
        add(
            "ClockDivider",
            "Clock Divider",
            Sequencing,
            "Passes every Nth clock pulse",
            || Box::new(nodes::ClockDivider::default()),
        );
        add(
            "StepSequencer",
            "Step Sequencer",
            Sequencing,
            "Up to 16 CV steps with direction modes",
            || Box::new(nodes::StepSequencer::new()),
        );
        add(
            "PitchDetector",
            "Pitch Detector",
            Analysis,
            "Autocorrelation fundamental estimator",
            || Box::new(nodes::PitchDetector::default()),
        );

        registry
    }

    /// Register (or replace) a node type
    pub fn register(&mut self, descriptor: NodeDescriptor, constructor: NodeConstructor) {
        let type_name = descriptor.type_name;
        if self
            .entries
            .insert(
                type_name,
                Entry {
                    descriptor,
                    constructor,
                },
            )
            .is_none()
        {
            self.order.push(type_name);
        }
    }

    /// Construct a default-configured node
    pub fn create(&self, type_name: &str) -> Result<Node> {
        let entry = self
            .entries
            .get(type_name)
            .ok_or_else(|| PatchcordError::UnknownNodeType {
                type_name: type_name.to_string(),
            })?;
        let mut node = Node::new((entry.constructor)());
        node.set_display_name(entry.descriptor.display_name);
        Ok(node)
    }

    /// Check if a node type is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn descriptor(&self, type_name: &str) -> Option<&NodeDescriptor> {
        self.entries.get(type_name).map(|e| &e.descriptor)
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.order
            .iter()
            .filter_map(move |name| self.entries.get(name).map(|e| &e.descriptor))
    }

    pub fn in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeDescriptor> {
        self.descriptors().filter(move |d| d.category == category)
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_type_constructs() {
        let registry = NodeRegistry::with_defaults();
        assert_eq!(registry.len(), 23);
        for name in registry.type_names() {
            let node = registry.create(name).unwrap();
            assert_eq!(node.type_name(), name);
            assert_eq!(
                node.display_name(),
                registry.descriptor(name).unwrap().display_name
            );
        }
    }

    #[test]
    fn test_every_node_survives_a_block() {
        let registry = NodeRegistry::with_defaults();
        for name in registry.type_names() {
            let mut node = registry.create(name).unwrap();
            let mut buffer = vec![0.25_f32; 256];
            node.process(&mut buffer, 256, 44100.0);
            node.process(&mut buffer, 256, 48000.0);
            assert!(buffer.iter().all(|s| s.is_finite()), "{name}");
            assert!(node.outputs().iter().all(|p| p.value().is_finite()), "{name}");
        }
    }

    #[test]
    fn test_parameter_names_are_unique() {
        let registry = NodeRegistry::with_defaults();
        for name in registry.type_names() {
            let node = registry.create(name).unwrap();
            let mut names: Vec<_> = node.parameters().map(|p| p.name()).collect();
            let count = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), count, "{name}");
        }
    }

    #[test]
    fn test_unknown_type() {
        let registry = NodeRegistry::with_defaults();
        let err = registry.create("Theremin").unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_NODE_TYPE");
        assert!(!registry.contains("Theremin"));
    }

    #[test]
    fn test_utility_listing() {
        let registry = NodeRegistry::with_defaults();
        let utility: Vec<_> = registry
            .in_category(NodeCategory::Utility)
            .map(|d| d.type_name)
            .collect();
        assert_eq!(utility, vec!["Gain", "VCA"]);
    }

    #[test]
    fn test_category_listing() {
        let registry = NodeRegistry::with_defaults();
        let dynamics: Vec<_> = registry
            .in_category(NodeCategory::Dynamics)
            .map(|d| d.type_name)
            .collect();
        assert_eq!(dynamics, vec!["Compressor", "Limiter", "Gate"]);
    }
}
