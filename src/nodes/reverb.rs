//! Schroeder-Moorer reverb (Freeverb tuning)
//!
//! - 8 parallel low-pass feedback comb filters per channel
//! - 4 series allpass diffusers per channel
//! - Right channel delays offset by a fixed stereo spread
//! - Pre-delay ahead of the tank
//!
//! The mono input feeds both channels. `Left` and `Right` carry the stereo
//! result; the scratch buffer receives their average.

use crate::dsp::{ms_to_samples, sanitize};
use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// Delay lengths are tuned at this rate and scaled for others
const REFERENCE_SAMPLE_RATE: f32 = 44100.0;

const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Right-channel offset in samples (at the reference rate)
const STEREO_SPREAD: usize = 23;

const ALLPASS_FEEDBACK: f32 = 0.5;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;
/// Input attenuation ahead of the eight summed combs
const INPUT_GAIN: f32 = 0.015;
const WET_SCALE: f32 = 3.0;

pub const MAX_PRE_DELAY_MS: f32 = 100.0;

/// Feedback comb with a one-pole low-pass in the loop
#[derive(Debug, Clone, Default)]
struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;
        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.pos = 0;
    }
}

/// Schroeder allpass diffuser
#[derive(Debug, Clone, Default)]
struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = delayed - input;
        self.buffer[self.pos] = input + delayed * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// One channel of the tank
#[derive(Debug, Clone, Default)]
struct Tank {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl Tank {
    fn new(sample_rate: f32, spread: usize) -> Self {
        let scale = sample_rate / REFERENCE_SAMPLE_RATE;
        let scaled = |len: usize| (((len + spread) as f32 * scale) as usize).max(1);
        Self {
            combs: COMB_DELAYS.iter().map(|&d| Comb::new(scaled(d))).collect(),
            allpasses: ALLPASS_DELAYS
                .iter()
                .map(|&d| Allpass::new(scaled(d)))
                .collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut out = 0.0;
        for comb in self.combs.iter_mut() {
            out += comb.process(input, feedback, damp);
        }
        for allpass in self.allpasses.iter_mut() {
            out = allpass.process(out);
        }
        out
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(Comb::clear);
        self.allpasses.iter_mut().for_each(Allpass::clear);
    }

    fn sanitize(&mut self) {
        for comb in self.combs.iter_mut() {
            comb.filter_state = sanitize(comb.filter_state);
        }
    }
}

/// Freeverb-style stereo reverb on a mono path
#[derive(Debug, Default)]
pub struct Reverb {
    left: Tank,
    right: Tank,
    pre_delay: Vec<f32>,
    pre_delay_pos: usize,
}

impl Reverb {
    const ROOM_SIZE: usize = 0;
    const DAMPING: usize = 1;
    const WIDTH: usize = 2;
    const PRE_DELAY: usize = 3;
    const WET: usize = 4;
    const DRY: usize = 5;

    /// Write `input`, return the sample from `delay` samples ago
    #[inline]
    fn pre_delay(&mut self, input: f32, delay: usize) -> f32 {
        let len = self.pre_delay.len();
        if delay == 0 || len == 0 {
            return input;
        }
        let delay = delay.min(len - 1);
        self.pre_delay[self.pre_delay_pos] = input;
        let out = self.pre_delay[(self.pre_delay_pos + len - delay) % len];
        self.pre_delay_pos = (self.pre_delay_pos + 1) % len;
        out
    }
}

impl Processor for Reverb {
    fn type_name(&self) -> &'static str {
        "Reverb"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Left", PortKind::Audio)
            .output("Right", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Room Size", 0.5, 0.0, 1.0, ""));
        params.add(Parameter::new("Damping", 0.5, 0.0, 1.0, ""));
        params.add(Parameter::new("Width", 1.0, 0.0, 1.0, ""));
        params.add(Parameter::new("Pre-Delay", 0.0, 0.0, MAX_PRE_DELAY_MS, "ms"));
        params.add(Parameter::new("Wet", 0.33, 0.0, 1.0, ""));
        params.add(Parameter::new("Dry", 1.0, 0.0, 1.0, ""));
    }

    fn prepare(&mut self, sample_rate: f32) {
        self.left = Tank::new(sample_rate, 0);
        self.right = Tank::new(sample_rate, STEREO_SPREAD);
        self.pre_delay = vec![0.0; ms_to_samples(MAX_PRE_DELAY_MS, sample_rate, 1) + 1];
        self.pre_delay_pos = 0;
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let feedback = ctx.param(Self::ROOM_SIZE) * ROOM_SCALE + ROOM_OFFSET;
        let damp = ctx.param(Self::DAMPING) * DAMP_SCALE;
        let width = ctx.param(Self::WIDTH);
        let wet = ctx.param(Self::WET) * WET_SCALE;
        let wet1 = wet * (width / 2.0 + 0.5);
        let wet2 = wet * ((1.0 - width) / 2.0);
        let dry = ctx.param(Self::DRY);
        let pre_delay = ms_to_samples(ctx.param(Self::PRE_DELAY), ctx.sample_rate(), 0);

        let (mut out_l, mut out_r) = (0.0, 0.0);
        for sample in buffer.iter_mut() {
            let input = *sample;
            let tank_in = self.pre_delay(input, pre_delay) * INPUT_GAIN;
            let l = self.left.process(tank_in, feedback, damp);
            let r = self.right.process(tank_in, feedback, damp);
            out_l = l * wet1 + r * wet2 + input * dry;
            out_r = r * wet1 + l * wet2 + input * dry;
            *sample = 0.5 * (out_l + out_r);
        }
        self.left.sanitize();
        self.right.sanitize();

        ctx.set_output(0, out_l);
        ctx.set_output(1, out_r);
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.pre_delay.fill(0.0);
        self.pre_delay_pos = 0;
    }
}
