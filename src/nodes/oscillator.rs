//! Oscillators: the band-limited audio Oscillator and the control-rate LFO.
//!
//! The audio oscillator runs a phase accumulator in [0, 1). Sine is computed
//! directly; saw and pulse are naive waveforms corrected with PolyBLEP at each
//! discontinuity, and triangle is a leaky integration of the corrected
//! square.

use std::f32::consts::TAU;

use crate::dsp::{poly_blep, sanitize, wrap_phase};
use crate::node::{
    EdgeDetector, Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor,
};

/// Highest frequency as a fraction of the sample rate
const MAX_FREQUENCY_RATIO: f32 = 0.49;

/// Waveform selection shared by both oscillators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
}

impl Waveform {
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Waveform::Saw,
            2 => Waveform::Square,
            3 => Waveform::Triangle,
            _ => Waveform::Sine,
        }
    }
}

// ============================================================================
// Oscillator
// ============================================================================

/// Anti-aliased audio oscillator
///
/// Overwrites the scratch buffer. Pitch CV is in octaves (1.0 doubles the
/// frequency); a rising edge on Sync resets the phase at the block start.
///
/// Sync is block-rate: the reset lands on the first sample of the block in
/// which the edge arrives, so sync timing is quantized to the host block.
#[derive(Debug)]
pub struct Oscillator {
    phase: f32,
    /// Triangle integrator state
    triangle: f32,
    sync: EdgeDetector,
}

impl Oscillator {
    const WAVEFORM: usize = 0;
    const FREQUENCY: usize = 1;
    const PULSE_WIDTH: usize = 2;
    const LEVEL: usize = 3;

    const PITCH_CV: usize = 0;
    const SYNC: usize = 1;

    pub fn new() -> Self {
        Self {
            phase: 0.0,
            triangle: -1.0,
            sync: EdgeDetector::default(),
        }
    }

    /// Next sample of the selected waveform; advances the phase
    #[inline]
    fn next_sample(&mut self, waveform: Waveform, dt: f32, pulse_width: f32) -> f32 {
        let p = self.phase;
        let value = match waveform {
            Waveform::Sine => (TAU * p).sin(),
            Waveform::Saw => 2.0 * p - 1.0 - poly_blep(p, dt),
            Waveform::Square => Self::pulse(p, dt, pulse_width),
            Waveform::Triangle => {
                // 4*dt per sample covers the full -1..1 swing in half a cycle
                let square = Self::pulse(p, dt, 0.5);
                let leak = 1.0 - 0.05 * dt;
                self.triangle = (self.triangle * leak + 4.0 * dt * square).clamp(-1.0, 1.0);
                self.triangle
            }
        };
        self.phase = wrap_phase(p + dt);
        value
    }

    /// PolyBLEP-corrected pulse with rising edge at 0 and falling edge at `width`
    #[inline]
    fn pulse(p: f32, dt: f32, width: f32) -> f32 {
        let naive = if p < width { 1.0 } else { -1.0 };
        naive + poly_blep(p, dt) - poly_blep(wrap_phase(p + 1.0 - width), dt)
    }
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Oscillator {
    fn type_name(&self) -> &'static str {
        "Oscillator"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("Pitch CV", PortKind::Control)
            // Hard sync, sampled once per block
            .input("Sync", PortKind::Trigger)
            .output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Waveform", 0.0, 0.0, 3.0, ""));
        params.add(Parameter::new("Frequency", 440.0, 20.0, 20000.0, "Hz").logarithmic());
        params.add(Parameter::new("Pulse Width", 0.5, 0.05, 0.95, ""));
        params.add(Parameter::new("Level", 1.0, 0.0, 1.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        if self.sync.rising(ctx.input(Self::SYNC)) {
            self.phase = 0.0;
            self.triangle = -1.0;
        }

        let sample_rate = ctx.sample_rate();
        let pitch_cv = ctx.input(Self::PITCH_CV).clamp(-10.0, 10.0);
        let frequency = (ctx.param(Self::FREQUENCY) * pitch_cv.exp2())
            .clamp(0.0, sample_rate * MAX_FREQUENCY_RATIO);
        let dt = frequency / sample_rate;
        let waveform = Waveform::from_index(ctx.param_choice(Self::WAVEFORM));
        let pulse_width = ctx.param(Self::PULSE_WIDTH);
        let level = ctx.param(Self::LEVEL);

        for sample in buffer.iter_mut() {
            *sample = level * self.next_sample(waveform, dt, pulse_width);
        }
        self.triangle = sanitize(self.triangle);

        ctx.set_output(0, buffer[buffer.len() - 1]);
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

// ============================================================================
// LFO
// ============================================================================

/// Low-frequency modulation source
///
/// Leaves the scratch buffer untouched; Out holds `offset + depth * wave`
/// at the end of each block.
#[derive(Debug, Default)]
pub struct Lfo {
    phase: f32,
    reset: EdgeDetector,
}

impl Lfo {
    const WAVEFORM: usize = 0;
    const RATE: usize = 1;
    const DEPTH: usize = 2;
    const OFFSET: usize = 3;

    fn shape(waveform: Waveform, phase: f32) -> f32 {
        match waveform {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

impl Processor for Lfo {
    fn type_name(&self) -> &'static str {
        "LFO"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("Reset", PortKind::Trigger)
            .output("Out", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Waveform", 0.0, 0.0, 3.0, ""));
        params.add(Parameter::new("Rate", 1.0, 0.01, 50.0, "Hz").logarithmic());
        params.add(Parameter::new("Depth", 1.0, 0.0, 1.0, ""));
        params.add(Parameter::new("Offset", 0.0, -1.0, 1.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        if self.reset.rising(ctx.input(0)) {
            self.phase = 0.0;
        }
        let increment = ctx.param(Self::RATE) / ctx.sample_rate();
        let last = (buffer.len() - 1) as f32;
        let phase = wrap_phase(self.phase + increment * last);
        self.phase = wrap_phase(self.phase + increment * buffer.len() as f32);

        let waveform = Waveform::from_index(ctx.param_choice(Self::WAVEFORM));
        let value = ctx.param(Self::OFFSET) + ctx.param(Self::DEPTH) * Self::shape(waveform, phase);
        ctx.set_output(0, value);
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.reset.reset();
    }
}
