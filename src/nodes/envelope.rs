//! ADSR envelope generator.

use crate::dsp::ms_to_samples;
use crate::node::{
    is_high, Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor,
};

/// Steepness of the exponential/logarithmic curve shapes
const CURVE_STEEPNESS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Map linear stage progress (0..1) through the curve blend
///
/// `curve` 0 is linear; towards +1 the ramp bends like an analog RC charge
/// (fast start), towards -1 it bends the other way (slow start).
#[inline]
pub fn shape_progress(progress: f32, curve: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0);
    let k = CURVE_STEEPNESS;
    if curve > 0.0 {
        let bent = (1.0 - (-k * p).exp()) / (1.0 - (-k).exp());
        p + (bent - p) * curve.min(1.0)
    } else if curve < 0.0 {
        let bent = ((k * p).exp() - 1.0) / (k.exp() - 1.0);
        p + (bent - p) * (-curve).min(1.0)
    } else {
        p
    }
}

/// Gate-driven ADSR state machine
///
/// Advances once per sample. A rising gate (re)starts the attack from the
/// current level and a falling gate releases from the current level. The
/// scratch buffer is left untouched; the last level of each block goes out
/// on the `Envelope` port, so amplitude shaping needs an explicit `VCA`.
#[derive(Debug)]
pub struct Envelope {
    stage: Stage,
    level: f32,
    /// Level at the start of the current stage
    start: f32,
    /// Samples elapsed in the current stage
    elapsed: usize,
    gate: bool,
}

impl Envelope {
    const ATTACK: usize = 0;
    const DECAY: usize = 1;
    const SUSTAIN: usize = 2;
    const RELEASE: usize = 3;
    const CURVE: usize = 4;

    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            level: 0.0,
            start: 0.0,
            elapsed: 0,
            gate: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.start = self.level;
        self.elapsed = 0;
    }

    /// Advance one sample
    #[inline]
    fn tick(&mut self, lengths: &StageLengths, sustain: f32, curve: f32) -> f32 {
        match self.stage {
            Stage::Idle => {}
            Stage::Attack => {
                let p = self.advance(lengths.attack);
                self.level = self.start + (1.0 - self.start) * shape_progress(p, curve);
                if p >= 1.0 {
                    self.level = 1.0;
                    self.enter(Stage::Decay);
                }
            }
            Stage::Decay => {
                let p = self.advance(lengths.decay);
                self.level = self.start + (sustain - self.start) * shape_progress(p, curve);
                if p >= 1.0 {
                    self.level = sustain;
                    self.enter(Stage::Sustain);
                }
            }
            Stage::Sustain => self.level = sustain,
            Stage::Release => {
                let p = self.advance(lengths.release);
                self.level = self.start * (1.0 - shape_progress(p, curve));
                if p >= 1.0 {
                    self.level = 0.0;
                    self.enter(Stage::Idle);
                }
            }
        }
        self.level
    }

    #[inline]
    fn advance(&mut self, length: usize) -> f32 {
        self.elapsed += 1;
        (self.elapsed as f32 / length as f32).min(1.0)
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

struct StageLengths {
    attack: usize,
    decay: usize,
    release: usize,
}

impl Processor for Envelope {
    fn type_name(&self) -> &'static str {
        "Envelope"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("Gate", PortKind::Gate)
            .output("Envelope", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Attack", 10.0, 0.0, 10000.0, "ms"));
        params.add(Parameter::new("Decay", 100.0, 0.0, 10000.0, "ms"));
        params.add(Parameter::new("Sustain", 0.7, 0.0, 1.0, ""));
        params.add(Parameter::new("Release", 200.0, 0.0, 10000.0, "ms"));
        params.add(Parameter::new("Curve", 0.0, -1.0, 1.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let gate = is_high(ctx.input(0));
        if gate && !self.gate {
            self.enter(Stage::Attack);
        } else if !gate && self.gate && self.stage != Stage::Idle {
            self.enter(Stage::Release);
        }
        self.gate = gate;

        let sr = ctx.sample_rate();
        let lengths = StageLengths {
            attack: ms_to_samples(ctx.param(Self::ATTACK), sr, 1),
            decay: ms_to_samples(ctx.param(Self::DECAY), sr, 1),
            release: ms_to_samples(ctx.param(Self::RELEASE), sr, 1),
        };
        let sustain = ctx.param(Self::SUSTAIN);
        let curve = ctx.param(Self::CURVE);

        for _ in 0..buffer.len() {
            self.tick(&lengths, sustain, curve);
        }
        ctx.set_output(0, self.level);
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use approx::assert_relative_eq;

    #[test]
    fn test_curve_endpoints() {
        for curve in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            assert_relative_eq!(shape_progress(0.0, curve), 0.0, epsilon = 1e-6);
            assert_relative_eq!(shape_progress(1.0, curve), 1.0, epsilon = 1e-6);
        }
        assert!(shape_progress(0.2, 1.0) > 0.2);
        assert!(shape_progress(0.2, -1.0) < 0.2);
    }

    #[test]
    fn test_idle_without_gate() {
        let mut node = Node::from_processor(Envelope::new());
        let mut buffer = [1.0_f32; 64];
        node.process(&mut buffer, 64, 48000.0);
        assert_eq!(node.output_value(0), Some(0.0));
    }

    #[test]
    fn test_leaves_audio_untouched() {
        let mut node = Node::from_processor(Envelope::new());
        node.set_input(0, 1.0).unwrap();
        let mut buffer = [0.3_f32; 256];
        node.process(&mut buffer, 256, 48000.0);
        assert!(node.output_value(0).unwrap() > 0.0);
        assert_eq!(buffer, [0.3; 256]);
    }

    #[test]
    fn test_attack_reaches_peak_on_schedule() {
        let mut node = Node::from_processor(Envelope::new());
        node.set_input(0, 1.0).unwrap();
        let mut buffer = [0.0_f32; 240];
        node.process(&mut buffer, 240, 48000.0);
        let half = node.output_value(0).unwrap();
        assert!(half > 0.45 && half < 0.55);
        node.process(&mut buffer, 240, 48000.0);
        assert_relative_eq!(node.output_value(0).unwrap(), 1.0);
    }

    #[test]
    fn test_release_from_mid_attack() {
        let mut node = Node::from_processor(Envelope::new());
        node.set_input(0, 1.0).unwrap();
        let mut buffer = [0.0_f32; 240];
        node.process(&mut buffer, 240, 48000.0);
        let mid = node.output_value(0).unwrap();
        node.set_input(0, 0.0).unwrap();
        node.process(&mut buffer[..1], 1, 48000.0);
        let released = node.output_value(0).unwrap();
        assert!(released < mid);
        assert!(released > mid * 0.9);
    }

    #[test]
    fn test_retrigger_starts_from_current_level() {
        let mut node = Node::from_processor(Envelope::new());
        node.set_input(0, 1.0).unwrap();
        let mut buffer = [0.0_f32; 4800];
        node.process(&mut buffer, 4800, 48000.0);
        node.set_input(0, 0.0).unwrap();
        node.process(&mut buffer[..100], 100, 48000.0);
        let level = node.output_value(0).unwrap();
        node.set_input(0, 1.0).unwrap();
        node.process(&mut buffer[..1], 1, 48000.0);
        let restarted = node.output_value(0).unwrap();
        assert!(restarted >= level);
        assert!(restarted - level < 0.01);
    }
}
