//! Modulation effects: Chorus, Flanger and Phaser.
//!
//! Chorus and flanger share one core, a delay line whose read position is
//! swept by a sine LFO with optional feedback; they differ only in delay
//! range and defaults. The phaser sweeps the break frequency of a cascade
//! of first-order allpass stages.

use std::f32::consts::{PI, TAU};

use crate::dsp::{sanitize, wrap_phase, DelayLine};
use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// Maximum phaser stage count
pub const MAX_PHASER_STAGES: usize = 12;

// ============================================================================
// Modulated delay (chorus / flanger)
// ============================================================================

/// Delay ranges and defaults distinguishing chorus from flanger
#[derive(Debug, Clone, Copy)]
struct SweepVoicing {
    type_name: &'static str,
    rate: f32,
    depth: f32,
    delay_ms: (f32, f32, f32),
    /// Peak modulation swing in ms at Depth = 1
    sweep_ms: f32,
    feedback: (f32, f32, f32),
    mix: f32,
}

const CHORUS: SweepVoicing = SweepVoicing {
    type_name: "Chorus",
    rate: 0.8,
    depth: 0.5,
    delay_ms: (15.0, 5.0, 40.0),
    sweep_ms: 10.0,
    feedback: (0.0, 0.0, 0.9),
    mix: 0.5,
};

const FLANGER: SweepVoicing = SweepVoicing {
    type_name: "Flanger",
    rate: 0.25,
    depth: 0.7,
    delay_ms: (2.0, 0.1, 10.0),
    sweep_ms: 4.0,
    feedback: (0.5, -0.95, 0.95),
    mix: 0.5,
};

/// Shared chorus/flanger processor
#[derive(Debug)]
struct SweptDelay {
    voicing: SweepVoicing,
    line: DelayLine,
    phase: f32,
}

impl SweptDelay {
    const RATE: usize = 0;
    const DEPTH: usize = 1;
    const DELAY: usize = 2;
    const FEEDBACK: usize = 3;
    const MIX: usize = 4;

    fn new(voicing: SweepVoicing) -> Self {
        Self {
            voicing,
            line: DelayLine::default(),
            phase: 0.0,
        }
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        let v = &self.voicing;
        let (delay, delay_min, delay_max) = v.delay_ms;
        let (fb, fb_min, fb_max) = v.feedback;
        params.add(Parameter::new("Rate", v.rate, 0.01, 10.0, "Hz").logarithmic());
        params.add(Parameter::new("Depth", v.depth, 0.0, 1.0, ""));
        params.add(Parameter::new("Delay", delay, delay_min, delay_max, "ms"));
        params.add(Parameter::new("Feedback", fb, fb_min, fb_max, ""));
        params.add(Parameter::new("Mix", v.mix, 0.0, 1.0, ""));
    }

    fn prepare(&mut self, sample_rate: f32) {
        let max_ms = self.voicing.delay_ms.2 + self.voicing.sweep_ms;
        self.line
            .resize((max_ms / 1000.0 * sample_rate).ceil() as usize + 4);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate();
        let increment = ctx.param(Self::RATE) / sr;
        let sweep = ctx.param(Self::DEPTH) * self.voicing.sweep_ms / 1000.0 * sr;
        let base = ctx.param(Self::DELAY) / 1000.0 * sr;
        let feedback = ctx.param(Self::FEEDBACK);
        let mix = ctx.param(Self::MIX);

        for sample in buffer.iter_mut() {
            let lfo = 0.5 + 0.5 * (TAU * self.phase).sin();
            self.phase = wrap_phase(self.phase + increment);

            let input = *sample;
            let delayed = self.line.read(base + sweep * lfo);
            self.line.write(input + delayed * feedback);
            *sample = input * (1.0 - mix) + delayed * mix;
        }
        ctx.set_output(0, buffer[buffer.len() - 1]);
    }

    fn reset(&mut self) {
        self.line.clear();
        self.phase = 0.0;
    }
}

macro_rules! swept_delay_node {
    ($name:ident, $voicing:expr) => {
        #[derive(Debug)]
        pub struct $name(SweptDelay);

        impl $name {
            pub fn new() -> Self {
                Self(SweptDelay::new($voicing))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Processor for $name {
            fn type_name(&self) -> &'static str {
                self.0.voicing.type_name
            }

            fn initialize_ports(&self, ports: &mut PortLayout) {
                ports
                    .input("In", PortKind::Audio)
                    .output("Out", PortKind::Audio);
            }

            fn initialize_parameters(&self, params: &mut ParameterSet) {
                self.0.initialize_parameters(params);
            }

            fn prepare(&mut self, sample_rate: f32) {
                self.0.prepare(sample_rate);
            }

            fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
                self.0.process(ctx, buffer);
            }

            fn reset(&mut self) {
                self.0.reset();
            }
        }
    };
}

swept_delay_node!(Chorus, CHORUS);
swept_delay_node!(Flanger, FLANGER);

// ============================================================================
// Phaser
// ============================================================================

/// Swept allpass cascade with feedback
///
/// Each stage is `H(z) = (a + z^-1) / (1 + a*z^-1)` with
/// `a = (tan(pi*f/sr) - 1) / (tan(pi*f/sr) + 1)`; all stages share one
/// break frequency, swept exponentially between Min Freq and Max Freq.
#[derive(Debug, Default)]
pub struct Phaser {
    stages: [f32; MAX_PHASER_STAGES],
    phase: f32,
    last: f32,
}

impl Phaser {
    const RATE: usize = 0;
    const DEPTH: usize = 1;
    const MIN_FREQ: usize = 2;
    const MAX_FREQ: usize = 3;
    const STAGES: usize = 4;
    const FEEDBACK: usize = 5;
    const MIX: usize = 6;
}

impl Processor for Phaser {
    fn type_name(&self) -> &'static str {
        "Phaser"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Rate", 0.5, 0.01, 10.0, "Hz").logarithmic());
        params.add(Parameter::new("Depth", 1.0, 0.0, 1.0, ""));
        params.add(Parameter::new("Min Freq", 200.0, 20.0, 5000.0, "Hz").logarithmic());
        params.add(Parameter::new("Max Freq", 2000.0, 100.0, 18000.0, "Hz").logarithmic());
        params.add(Parameter::new(
            "Stages",
            4.0,
            2.0,
            MAX_PHASER_STAGES as f32,
            "",
        ));
        params.add(Parameter::new("Feedback", 0.5, 0.0, 0.95, ""));
        params.add(Parameter::new("Mix", 0.5, 0.0, 1.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate();
        let increment = ctx.param(Self::RATE) / sr;
        let depth = ctx.param(Self::DEPTH);
        let nyquist_guard = sr * 0.49;
        let (lo, hi) = {
            let a = ctx.param(Self::MIN_FREQ).min(nyquist_guard);
            let b = ctx.param(Self::MAX_FREQ).min(nyquist_guard);
            if a <= b {
                (a, b)
            } else {
                (b, a)
            }
        };
        let stage_count = ctx.param_choice(Self::STAGES).clamp(1, MAX_PHASER_STAGES);
        let feedback = ctx.param(Self::FEEDBACK);
        let mix = ctx.param(Self::MIX);

        for sample in buffer.iter_mut() {
            let lfo = 0.5 + 0.5 * (TAU * self.phase).sin();
            self.phase = wrap_phase(self.phase + increment);
            let freq = lo * (hi / lo).powf(lfo * depth);
            let t = (PI * freq / sr).tan();
            let a = (t - 1.0) / (t + 1.0);

            let input = *sample;
            let mut x = input + self.last * feedback;
            for state in self.stages[..stage_count].iter_mut() {
                let y = a * x + *state;
                *state = x - a * y;
                x = y;
            }
            self.last = x;
            *sample = input * (1.0 - mix) + x * mix;
        }
        self.last = sanitize(self.last);
        self.stages.iter_mut().for_each(|s| *s = sanitize(*s));

        ctx.set_output(0, buffer[buffer.len() - 1]);
    }

    fn reset(&mut self) {
        self.stages = [0.0; MAX_PHASER_STAGES];
        self.phase = 0.0;
        self.last = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use approx::assert_relative_eq;

    fn sine(frequency: f32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|n| (TAU * frequency * n as f32 / 48000.0).sin())
            .collect()
    }

    #[test]
    fn test_chorus_without_depth_is_a_fixed_delay() {
        let mut node = Node::from_processor(Chorus::new());
        node.set_parameter("Depth", 0.0).unwrap();
        node.set_parameter("Delay", 10.0).unwrap();
        node.set_parameter("Mix", 1.0).unwrap();
        let mut buffer = vec![0.0; 1000];
        buffer[0] = 1.0;
        node.process(&mut buffer, 1000, 48000.0);
        assert_relative_eq!(buffer[480], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_flanger_feedback_stays_bounded() {
        let mut node = Node::from_processor(Flanger::new());
        node.set_parameter("Feedback", 0.95).unwrap();
        node.set_parameter("Rate", 2.0).unwrap();
        let mut buffer = sine(300.0, 48000);
        node.process(&mut buffer, 48000, 48000.0);
        assert!(buffer.iter().all(|s| s.is_finite() && s.abs() < 25.0));
    }

    #[test]
    fn test_type_names_follow_voicing() {
        assert_eq!(Node::from_processor(Chorus::new()).type_name(), "Chorus");
        assert_eq!(Node::from_processor(Flanger::new()).type_name(), "Flanger");
        let flanger = Node::from_processor(Flanger::new());
        assert_eq!(flanger.parameter_info("Feedback").unwrap().min(), -0.95);
    }

    #[test]
    fn test_phaser_dry_mix_is_identity() {
        let mut node = Node::from_processor(Phaser::default());
        node.set_parameter("Mix", 0.0).unwrap();
        let input = sine(440.0, 480);
        let mut buffer = input.clone();
        node.process(&mut buffer, 480, 48000.0);
        assert_eq!(buffer, input);
    }

    #[test]
    fn test_phaser_allpass_preserves_level() {
        // Wet only, no feedback: the cascade is allpass, so the level holds
        let mut node = Node::from_processor(Phaser::default());
        node.set_parameter("Mix", 1.0).unwrap();
        node.set_parameter("Feedback", 0.0).unwrap();
        node.set_parameter("Depth", 0.0).unwrap();
        let mut buffer = sine(1000.0, 9600);
        node.process(&mut buffer, 9600, 48000.0);
        let peak = buffer[4800..].iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        assert_relative_eq!(peak, 1.0, epsilon = 0.02);
    }
}
