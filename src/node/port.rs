//! Typed signal terminals owned by a node.

use serde::{Deserialize, Serialize};

/// Level at or above which Gate/Trigger values read as "high"
pub const GATE_THRESHOLD: f32 = 0.5;

/// Signal kind carried by a port
///
/// Every port holds a single `f32`; the kind documents intent and drives
/// connection plausibility checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Audio-rate signal
    Audio,
    /// Continuous control value
    Control,
    /// Boolean level (high while >= 0.5)
    Gate,
    /// Boolean level consumed by rising edge
    Trigger,
}

impl PortKind {
    /// Lowercase name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            PortKind::Audio => "audio",
            PortKind::Control => "control",
            PortKind::Gate => "gate",
            PortKind::Trigger => "trigger",
        }
    }

    /// Whether an input of this kind may be fed from `source`
    ///
    /// Control inputs take anything. Audio inputs take audio or control.
    /// Gate and trigger inputs take gate, trigger or control signals.
    pub fn accepts(&self, source: PortKind) -> bool {
        match self {
            PortKind::Control => true,
            PortKind::Audio => matches!(source, PortKind::Audio | PortKind::Control),
            PortKind::Gate | PortKind::Trigger => !matches!(source, PortKind::Audio),
        }
    }
}

/// Direction of a port relative to its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    /// Lowercase name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }
}

/// A port and its current value
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    name: &'static str,
    direction: PortDirection,
    kind: PortKind,
    value: f32,
}

impl Port {
    /// Create a port initialized to 0.0
    pub fn new(name: &'static str, direction: PortDirection, kind: PortKind) -> Self {
        Self {
            name,
            direction,
            kind,
            value: 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Last value written to this port
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    /// Boolean reading of the value (>= [`GATE_THRESHOLD`])
    pub fn is_high(&self) -> bool {
        is_high(self.value)
    }
}

/// Boolean reading of a gate/trigger value
#[inline]
pub fn is_high(value: f32) -> bool {
    value >= GATE_THRESHOLD
}

/// Fixed port shape declared by a processor at construction
#[derive(Debug, Clone, Default)]
pub struct PortLayout {
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl PortLayout {
    /// Declare the next input port
    pub fn input(&mut self, name: &'static str, kind: PortKind) -> &mut Self {
        self.inputs.push(Port::new(name, PortDirection::Input, kind));
        self
    }

    /// Declare the next output port
    pub fn output(&mut self, name: &'static str, kind: PortKind) -> &mut Self {
        self.outputs.push(Port::new(name, PortDirection::Output, kind));
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<Port>, Vec<Port>) {
        (self.inputs, self.outputs)
    }
}

/// Rising-edge detector for trigger inputs
///
/// Ports hold no edge history, so consumers keep one of these per input.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    /// Feed the current value; true on a low-to-high transition
    #[inline]
    pub fn rising(&mut self, value: f32) -> bool {
        let high = is_high(value);
        let rose = high && !self.previous;
        self.previous = high;
        rose
    }

    pub fn reset(&mut self) {
        self.previous = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_plausibility() {
        assert!(PortKind::Audio.accepts(PortKind::Audio));
        assert!(PortKind::Audio.accepts(PortKind::Control));
        assert!(!PortKind::Audio.accepts(PortKind::Gate));
        assert!(PortKind::Control.accepts(PortKind::Trigger));
        assert!(PortKind::Trigger.accepts(PortKind::Gate));
        assert!(!PortKind::Gate.accepts(PortKind::Audio));
    }

    #[test]
    fn test_gate_threshold() {
        let mut port = Port::new("Gate", PortDirection::Input, PortKind::Gate);
        assert!(!port.is_high());
        port.set_value(0.5);
        assert!(port.is_high());
        port.set_value(0.49);
        assert!(!port.is_high());
    }

    #[test]
    fn test_edge_detector() {
        let mut edge = EdgeDetector::default();
        assert!(!edge.rising(0.0));
        assert!(edge.rising(1.0));
        assert!(!edge.rising(1.0));
        assert!(!edge.rising(0.2));
        assert!(edge.rising(0.7));
    }

    #[test]
    fn test_layout_order() {
        let mut layout = PortLayout::default();
        layout
            .input("In", PortKind::Audio)
            .input("Sync", PortKind::Trigger)
            .output("Out", PortKind::Audio);
        let (inputs, outputs) = layout.into_parts();
        assert_eq!(inputs[1].name(), "Sync");
        assert_eq!(outputs[0].direction(), PortDirection::Output);
    }
}
