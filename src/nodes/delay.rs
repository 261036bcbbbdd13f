//! Feedback delay with a damped repeat path.

use std::f32::consts::PI;

use crate::dsp::{ms_to_samples, sanitize, time_coefficient, DelayLine};
use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// Longest delay time in milliseconds
pub const MAX_DELAY_MS: f32 = 2000.0;

/// Delay-time changes glide over this time constant
const TIME_SMOOTHING_MS: f32 = 50.0;

/// Mono delay with feedback and a low-pass "Tone" in the repeat path
///
/// The read position is a fractional sample count (Hermite interpolated)
/// clamped to at least one sample, so a requested time of 0 reads the most
/// recently written sample, never stale memory.
#[derive(Debug, Default)]
pub struct Delay {
    line: DelayLine,
    /// Smoothed delay time in samples; `None` until the first block
    time_samples: Option<f32>,
    time_coeff: f32,
    tone_state: f32,
}

impl Delay {
    const TIME: usize = 0;
    const FEEDBACK: usize = 1;
    const TONE: usize = 2;
    const WET: usize = 3;
    const DRY: usize = 4;

    const TIME_CV: usize = 1;
}

impl Processor for Delay {
    fn type_name(&self) -> &'static str {
        "Delay"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .input("Time CV", PortKind::Control)
            .output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Time", 250.0, 0.0, MAX_DELAY_MS, "ms"));
        params.add(Parameter::new("Feedback", 0.3, 0.0, 0.95, ""));
        params.add(Parameter::new("Tone", 8000.0, 200.0, 20000.0, "Hz").logarithmic());
        params.add(Parameter::new("Wet", 0.5, 0.0, 1.0, ""));
        params.add(Parameter::new("Dry", 1.0, 0.0, 1.0, ""));
    }

    fn prepare(&mut self, sample_rate: f32) {
        self.line
            .resize(ms_to_samples(MAX_DELAY_MS, sample_rate, 1) + 1);
        self.time_coeff = time_coefficient(TIME_SMOOTHING_MS, sample_rate);
        self.time_samples = None;
        self.tone_state = 0.0;
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate();
        let time_ms = (ctx.param(Self::TIME) + ctx.input(Self::TIME_CV)).clamp(0.0, MAX_DELAY_MS);
        let target = time_ms / 1000.0 * sr;
        let feedback = ctx.param(Self::FEEDBACK);
        let tone = 1.0 - (-2.0 * PI * ctx.param(Self::TONE).min(sr * 0.49) / sr).exp();
        let wet = ctx.param(Self::WET);
        let dry = ctx.param(Self::DRY);

        let mut time = *self.time_samples.get_or_insert(target);
        for sample in buffer.iter_mut() {
            time = target + self.time_coeff * (time - target);
            let input = *sample;
            let delayed = self.line.read(time);
            self.tone_state += tone * (delayed - self.tone_state);
            self.line.write(input + self.tone_state * feedback);
            *sample = input * dry + delayed * wet;
        }
        self.time_samples = Some(time);
        self.tone_state = sanitize(self.tone_state);

        ctx.set_output(0, buffer[buffer.len() - 1]);
    }

    fn reset(&mut self) {
        self.line.clear();
        self.time_samples = None;
        self.tone_state = 0.0;
    }
}
