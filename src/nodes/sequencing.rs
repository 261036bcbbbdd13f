//! Sequencing: Clock, ClockDivider and StepSequencer.
//!
//! All three are edge-triggered state machines on the control path. They
//! leave the scratch buffer untouched and read their trigger inputs once per
//! block, so timing resolution is the host block size.

use crate::node::{
    is_high, EdgeDetector, Parameter, ParameterSet, PortKind, PortLayout, ProcessContext,
    Processor,
};

// ============================================================================
// Clock
// ============================================================================

/// Tempo clock with swing
///
/// Steps come in pairs; the second step of each pair starts late by
/// `Swing` of a step length. `Clock` is high for `Pulse Width` of the
/// available step time and `Step` counts steps within a 4-beat bar.
#[derive(Debug, Default)]
pub struct Clock {
    /// Samples elapsed inside the current step pair
    position: f64,
    /// Pairs completed since reset
    pairs: u64,
    reset: EdgeDetector,
}

impl Clock {
    const TEMPO: usize = 0;
    const DIVISION: usize = 1;
    const SWING: usize = 2;
    const PULSE_WIDTH: usize = 3;

    /// (gate, step within the pair) at the current position
    fn state(&self, step_len: f64, swing: f64, pulse_width: f64) -> (bool, u64) {
        let odd_start = step_len * (1.0 + swing);
        if self.position < odd_start {
            (self.position < step_len * pulse_width, 0)
        } else {
            let odd_len = 2.0 * step_len - odd_start;
            (self.position - odd_start < odd_len * pulse_width, 1)
        }
    }
}

impl Processor for Clock {
    fn type_name(&self) -> &'static str {
        "Clock"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("Reset", PortKind::Trigger)
            .output("Clock", PortKind::Gate)
            .output("Step", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Tempo", 120.0, 20.0, 300.0, "BPM"));
        params.add(Parameter::new("Division", 4.0, 1.0, 16.0, "/beat"));
        params.add(Parameter::new("Swing", 0.0, 0.0, 0.75, ""));
        params.add(Parameter::new("Pulse Width", 0.5, 0.05, 0.95, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        if self.reset.rising(ctx.input(0)) {
            self.position = 0.0;
            self.pairs = 0;
        }

        let division = ctx.param_choice(Self::DIVISION).max(1) as f64;
        let tempo = ctx.param(Self::TEMPO) as f64;
        let step_len = ctx.sample_rate() as f64 * 60.0 / (tempo * division);
        let swing = ctx.param(Self::SWING) as f64;
        let pulse_width = ctx.param(Self::PULSE_WIDTH) as f64;

        // Report the state at the last sample of the block
        self.position += (buffer.len() - 1) as f64;
        while self.position >= 2.0 * step_len {
            self.position -= 2.0 * step_len;
            self.pairs += 1;
        }
        let (gate, odd) = self.state(step_len, swing, pulse_width);
        self.position += 1.0;

        let steps_per_bar = (division as u64) * 4;
        let step = (self.pairs * 2 + odd) % steps_per_bar;
        ctx.set_output(0, if gate { 1.0 } else { 0.0 });
        ctx.set_output(1, step as f32);
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Clock divider
// ============================================================================

/// Passes every Nth clock pulse
///
/// The output follows the input level for selected pulses, so a division of
/// 1 is a pass-through.
#[derive(Debug, Default)]
pub struct ClockDivider {
    clock: EdgeDetector,
    reset: EdgeDetector,
    count: u32,
    selected: bool,
}

impl ClockDivider {
    const DIVISION: usize = 0;
}

impl Processor for ClockDivider {
    fn type_name(&self) -> &'static str {
        "ClockDivider"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("Clock", PortKind::Trigger)
            .input("Reset", PortKind::Trigger)
            .output("Out", PortKind::Trigger);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Division", 2.0, 1.0, 64.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, _buffer: &mut [f32]) {
        if self.reset.rising(ctx.input(1)) {
            self.count = 0;
        }
        let clock = ctx.input(0);
        if self.clock.rising(clock) {
            let division = ctx.param_choice(Self::DIVISION).max(1) as u32;
            self.selected = self.count % division == 0;
            self.count = (self.count + 1) % division;
        }
        let high = is_high(clock) && self.selected;
        ctx.set_output(0, if high { 1.0 } else { 0.0 });
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Step sequencer
// ============================================================================

pub const MAX_STEPS: usize = 16;

const STEP_NAMES: [&str; MAX_STEPS] = [
    "Step 1", "Step 2", "Step 3", "Step 4", "Step 5", "Step 6", "Step 7", "Step 8", "Step 9",
    "Step 10", "Step 11", "Step 12", "Step 13", "Step 14", "Step 15", "Step 16",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    PingPong,
}

impl Direction {
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Direction::Backward,
            2 => Direction::PingPong,
            _ => Direction::Forward,
        }
    }
}

/// Up to 16 CV steps advanced by a clock
///
/// The first clock after construction or reset plays the first step of the
/// chosen direction. `Gate` mirrors the clock level.
#[derive(Debug)]
pub struct StepSequencer {
    position: Option<usize>,
    ascending: bool,
    clock: EdgeDetector,
    reset: EdgeDetector,
}

impl StepSequencer {
    const STEPS: usize = 0;
    const DIRECTION: usize = 1;
    const FIRST_STEP: usize = 2;

    pub fn new() -> Self {
        Self {
            position: None,
            ascending: true,
            clock: EdgeDetector::default(),
            reset: EdgeDetector::default(),
        }
    }

    /// Next position for a sequence of `steps` (at least 1)
    fn advance(&mut self, steps: usize, direction: Direction) -> usize {
        let next = match (self.position, direction) {
            (None, Direction::Backward) => steps - 1,
            (None, _) => {
                self.ascending = true;
                0
            }
            (Some(p), Direction::Forward) => (p + 1) % steps,
            (Some(p), Direction::Backward) => (p + steps - 1) % steps,
            (Some(_), Direction::PingPong) if steps == 1 => 0,
            (Some(p), Direction::PingPong) => {
                let p = p.min(steps - 1);
                if self.ascending && p + 1 >= steps {
                    self.ascending = false;
                } else if !self.ascending && p == 0 {
                    self.ascending = true;
                }
                if self.ascending {
                    p + 1
                } else {
                    p - 1
                }
            }
        };
        self.position = Some(next);
        next
    }
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for StepSequencer {
    fn type_name(&self) -> &'static str {
        "StepSequencer"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("Clock", PortKind::Trigger)
            .input("Reset", PortKind::Trigger)
            .output("CV", PortKind::Control)
            .output("Gate", PortKind::Gate)
            .output("Step", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Steps", 8.0, 1.0, MAX_STEPS as f32, ""));
        params.add(Parameter::new("Direction", 0.0, 0.0, 2.0, ""));
        for name in STEP_NAMES {
            params.add(Parameter::new(name, 0.0, -5.0, 5.0, "V"));
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, _buffer: &mut [f32]) {
        if self.reset.rising(ctx.input(1)) {
            self.position = None;
        }
        let steps = ctx.param_choice(Self::STEPS).clamp(1, MAX_STEPS);
        let clock = ctx.input(0);
        if self.clock.rising(clock) {
            let direction = Direction::from_index(ctx.param_choice(Self::DIRECTION));
            self.advance(steps, direction);
        }

        let step = self.position.unwrap_or(0).min(steps - 1);
        ctx.set_output(0, ctx.param(Self::FIRST_STEP + step));
        ctx.set_output(1, if is_high(clock) { 1.0 } else { 0.0 });
        ctx.set_output(2, step as f32);
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use pretty_assertions::assert_eq;

    /// Feed alternating high/low clock blocks, collecting `output` after
    /// each high block
    fn clocked(node: &mut Node, pulses: usize, output: usize) -> Vec<f32> {
        let mut buffer = [0.0_f32; 8];
        let mut values = Vec::new();
        for _ in 0..pulses {
            node.set_input(0, 1.0).unwrap();
            node.process(&mut buffer, 8, 48000.0);
            values.push(node.output_value(output).unwrap());
            node.set_input(0, 0.0).unwrap();
            node.process(&mut buffer, 8, 48000.0);
        }
        values
    }

    fn sequencer(steps: f32, direction: f32) -> Node {
        let mut node = Node::from_processor(StepSequencer::new());
        node.set_parameter("Steps", steps).unwrap();
        node.set_parameter("Direction", direction).unwrap();
        node
    }

    #[test]
    fn test_forward_wraps() {
        let mut node = sequencer(3.0, 0.0);
        assert_eq!(clocked(&mut node, 5, 2), vec![0.0, 1.0, 2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_backward() {
        let mut node = sequencer(3.0, 1.0);
        assert_eq!(clocked(&mut node, 4, 2), vec![2.0, 1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_ping_pong() {
        let mut node = sequencer(3.0, 2.0);
        assert_eq!(
            clocked(&mut node, 7, 2),
            vec![0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0]
        );
    }

    #[test]
    fn test_cv_follows_step_values() {
        let mut node = sequencer(2.0, 0.0);
        node.set_parameter("Step 1", 0.5).unwrap();
        node.set_parameter("Step 2", -1.0).unwrap();
        assert_eq!(clocked(&mut node, 3, 0), vec![0.5, -1.0, 0.5]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut node = sequencer(4.0, 0.0);
        clocked(&mut node, 3, 2);
        node.set_input(1, 1.0).unwrap();
        let mut buffer = [0.0_f32; 8];
        node.process(&mut buffer, 8, 48000.0);
        assert_eq!(clocked(&mut node, 1, 2), vec![0.0]);
    }

    #[test]
    fn test_divider_passes_every_nth() {
        let mut node = Node::from_processor(ClockDivider::default());
        node.set_parameter("Division", 3.0).unwrap();
        assert_eq!(
            clocked(&mut node, 6, 0),
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_divider_by_one_is_pass_through() {
        let mut node = Node::from_processor(ClockDivider::default());
        node.set_parameter("Division", 1.0).unwrap();
        assert_eq!(clocked(&mut node, 3, 0), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_clock_steps_at_tempo() {
        // 120 BPM, 4 per beat: one step every 6000 samples at 48 kHz
        let mut node = Node::from_processor(Clock::default());
        let mut buffer = [0.0_f32; 1000];
        let mut gates = Vec::new();
        let mut steps = Vec::new();
        for _ in 0..24 {
            node.process(&mut buffer, 1000, 48000.0);
            gates.push(node.output_value(0).unwrap());
            steps.push(node.output_value(1).unwrap());
        }
        // Last samples 999, 1999, 2999 are inside the first 3000-sample pulse
        assert_eq!(&gates[..4], &[1.0, 1.0, 1.0, 0.0]);
        assert_eq!(steps[5], 0.0);
        assert_eq!(steps[6], 1.0);
        assert_eq!(steps[12], 2.0);
    }

    #[test]
    fn test_swing_delays_odd_steps() {
        let mut node = Node::from_processor(Clock::default());
        node.set_parameter("Swing", 0.5).unwrap();
        let mut buffer = [0.0_f32; 1000];
        let mut steps = Vec::new();
        for _ in 0..12 {
            node.process(&mut buffer, 1000, 48000.0);
            steps.push(node.output_value(1).unwrap());
        }
        // The odd step now starts at 9000 instead of 6000
        assert_eq!(steps[7], 0.0);
        assert_eq!(steps[9], 1.0);
    }

    #[test]
    fn test_sequencer_leaves_buffer_alone() {
        let mut node = sequencer(4.0, 0.0);
        let mut buffer = [0.25_f32; 8];
        node.set_input(0, 1.0).unwrap();
        node.process(&mut buffer, 8, 48000.0);
        assert_eq!(buffer, [0.25; 8]);
    }
}
