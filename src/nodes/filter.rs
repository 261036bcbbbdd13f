//! Filters: the Moog-style LadderFilter and the three-band ParametricEQ.

use std::f32::consts::PI;

use crate::dsp::{db_to_linear, sanitize, BiquadCoeffs, BiquadShape, BiquadState};
use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

// ============================================================================
// Ladder filter
// ============================================================================

/// Internal oversampling factor
const OVERSAMPLE: usize = 2;

/// Feedback ceiling; 4.0 is the self-oscillation limit
const MAX_FEEDBACK: f32 = 3.99;

/// Four cascaded one-pole stages with tanh-saturated feedback
///
/// Runs at 2x the host rate. LP, BP and HP are mixed from the stage taps:
///
/// ```text
/// LP = y4
/// BP = 4*y2 - 8*y3 + 4*y4
/// HP = y0 - 4*y1 + 6*y2 - 4*y3 + y4
/// ```
///
/// `Mode` selects which response replaces the scratch buffer; all three
/// are published on the output ports.
#[derive(Debug, Default)]
pub struct LadderFilter {
    stage: [f32; 4],
}

/// Last tap values of one oversampled step
#[derive(Debug, Clone, Copy, Default)]
struct LadderTaps {
    lp: f32,
    bp: f32,
    hp: f32,
}

impl LadderFilter {
    const CUTOFF: usize = 0;
    const RESONANCE: usize = 1;
    const DRIVE: usize = 2;
    const MODE: usize = 3;

    const CUTOFF_CV: usize = 1;

    #[inline]
    fn tick(&mut self, input: f32, g: f32, k: f32) -> LadderTaps {
        let y0 = (input - k * self.stage[3]).tanh();
        let [y1, y2, y3, y4] = &mut self.stage;
        *y1 += g * (y0 - *y1);
        *y2 += g * (*y1 - *y2);
        *y3 += g * (*y2 - *y3);
        *y4 += g * (*y3 - *y4);
        LadderTaps {
            lp: *y4,
            bp: 4.0 * *y2 - 8.0 * *y3 + 4.0 * *y4,
            hp: y0 - 4.0 * *y1 + 6.0 * *y2 - 4.0 * *y3 + *y4,
        }
    }
}

impl Processor for LadderFilter {
    fn type_name(&self) -> &'static str {
        "LadderFilter"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .input("Cutoff CV", PortKind::Control)
            .output("LP", PortKind::Audio)
            .output("BP", PortKind::Audio)
            .output("HP", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Cutoff", 1000.0, 20.0, 20000.0, "Hz").logarithmic());
        params.add(Parameter::new("Resonance", 0.0, 0.0, 1.0, ""));
        params.add(Parameter::new("Drive", 1.0, 1.0, 10.0, ""));
        params.add(Parameter::new("Mode", 0.0, 0.0, 2.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let oversampled_rate = ctx.sample_rate() * OVERSAMPLE as f32;
        let cv = ctx.input(Self::CUTOFF_CV).clamp(-10.0, 10.0);
        let cutoff = (ctx.param(Self::CUTOFF) * cv.exp2()).clamp(10.0, oversampled_rate * 0.2);
        let g = 1.0 - (-2.0 * PI * cutoff / oversampled_rate).exp();
        let k = (ctx.param(Self::RESONANCE) * 4.0).min(MAX_FEEDBACK);
        let drive = ctx.param(Self::DRIVE);
        let mode = ctx.param_choice(Self::MODE);

        let mut taps = LadderTaps::default();
        for sample in buffer.iter_mut() {
            let input = *sample * drive;
            // Zero-order hold into the oversampled loop
            for _ in 0..OVERSAMPLE {
                taps = self.tick(input, g, k);
            }
            *sample = match mode {
                1 => taps.bp,
                2 => taps.hp,
                _ => taps.lp,
            };
        }
        self.stage.iter_mut().for_each(|s| *s = sanitize(*s));

        ctx.set_output(0, taps.lp);
        ctx.set_output(1, taps.bp);
        ctx.set_output(2, taps.hp);
    }

    fn reset(&mut self) {
        self.stage = [0.0; 4];
    }
}

// ============================================================================
// Parametric EQ
// ============================================================================

/// Low shelf, peaking mid and high shelf biquads in series
///
/// Coefficients are recomputed at the start of every block.
#[derive(Debug, Default)]
pub struct ParametricEq {
    sections: [(BiquadCoeffs, BiquadState); 3],
}

impl ParametricEq {
    const LOW_FREQ: usize = 0;
    const LOW_GAIN: usize = 1;
    const MID_FREQ: usize = 2;
    const MID_Q: usize = 3;
    const MID_GAIN: usize = 4;
    const HIGH_FREQ: usize = 5;
    const HIGH_GAIN: usize = 6;
    const OUTPUT: usize = 7;

    /// Shelf slope used for both shelves
    const SHELF_Q: f64 = 0.707;
}

impl Processor for ParametricEq {
    fn type_name(&self) -> &'static str {
        "ParametricEQ"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Low Freq", 100.0, 20.0, 1000.0, "Hz").logarithmic());
        params.add(Parameter::new("Low Gain", 0.0, -18.0, 18.0, "dB"));
        params.add(Parameter::new("Mid Freq", 1000.0, 100.0, 10000.0, "Hz").logarithmic());
        params.add(Parameter::new("Mid Q", 0.707, 0.1, 10.0, ""));
        params.add(Parameter::new("Mid Gain", 0.0, -18.0, 18.0, "dB"));
        params.add(Parameter::new("High Freq", 8000.0, 1000.0, 20000.0, "Hz").logarithmic());
        params.add(Parameter::new("High Gain", 0.0, -18.0, 18.0, "dB"));
        params.add(Parameter::new("Output", 0.0, -18.0, 18.0, "dB"));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate() as f64;
        let p = |idx: usize| ctx.param(idx) as f64;
        self.sections[0].0 = BiquadCoeffs::calculate(
            BiquadShape::LowShelf,
            sr,
            p(Self::LOW_FREQ),
            p(Self::LOW_GAIN),
            Self::SHELF_Q,
        );
        self.sections[1].0 = BiquadCoeffs::calculate(
            BiquadShape::Peak,
            sr,
            p(Self::MID_FREQ),
            p(Self::MID_GAIN),
            p(Self::MID_Q),
        );
        self.sections[2].0 = BiquadCoeffs::calculate(
            BiquadShape::HighShelf,
            sr,
            p(Self::HIGH_FREQ),
            p(Self::HIGH_GAIN),
            Self::SHELF_Q,
        );
        let output = db_to_linear(ctx.param(Self::OUTPUT));

        for sample in buffer.iter_mut() {
            let mut x = *sample as f64;
            for (coeffs, state) in self.sections.iter_mut() {
                x = state.process(x, coeffs);
            }
            *sample = x as f32 * output;
        }
        ctx.set_output(0, buffer[buffer.len() - 1]);
    }

    fn reset(&mut self) {
        for (_, state) in self.sections.iter_mut() {
            state.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use approx::assert_relative_eq;

    fn sine(frequency: f32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|n| (2.0 * PI * frequency * n as f32 / 48000.0).sin())
            .collect()
    }

    fn tail_peak(buffer: &[f32]) -> f32 {
        buffer[buffer.len() / 2..]
            .iter()
            .fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    fn ladder(cutoff: f32, resonance: f32, mode: f32) -> Node {
        let mut node = Node::from_processor(LadderFilter::default());
        node.set_parameter("Cutoff", cutoff).unwrap();
        node.set_parameter("Resonance", resonance).unwrap();
        node.set_parameter("Mode", mode).unwrap();
        node
    }

    #[test]
    fn test_lowpass_passes_lows_cuts_highs() {
        let mut node = ladder(500.0, 0.0, 0.0);
        let mut low = sine(50.0, 9600);
        node.process(&mut low, 9600, 48000.0);
        node.reset();
        let mut high = sine(8000.0, 9600);
        node.process(&mut high, 9600, 48000.0);
        assert!(tail_peak(&low) > 0.5);
        assert!(tail_peak(&high) < 0.01);
    }

    #[test]
    fn test_highpass_mode_cuts_lows() {
        let mut node = ladder(2000.0, 0.0, 2.0);
        let mut low = sine(50.0, 9600);
        node.process(&mut low, 9600, 48000.0);
        assert!(tail_peak(&low) < 0.05);
    }

    #[test]
    fn test_high_resonance_stays_bounded() {
        let mut node = ladder(1000.0, 1.0, 0.0);
        let mut buffer = sine(1000.0, 48000);
        node.process(&mut buffer, 48000, 48000.0);
        assert!(buffer.iter().all(|s| s.is_finite() && s.abs() < 2.0));
    }

    #[test]
    fn test_all_taps_published() {
        let mut node = ladder(1000.0, 0.3, 0.0);
        let mut buffer = sine(200.0, 480);
        node.process(&mut buffer, 480, 48000.0);
        assert_eq!(node.output_value(0), Some(buffer[479]));
        assert!(node.output_value(1).is_some());
        assert!(node.output_value(2).is_some());
    }

    #[test]
    fn test_flat_eq_is_transparent() {
        let mut node = Node::from_processor(ParametricEq::default());
        let input = sine(1000.0, 4800);
        let mut buffer = input.clone();
        node.process(&mut buffer, 4800, 48000.0);
        for (a, b) in input.iter().zip(&buffer) {
            assert_relative_eq!(a, b, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_mid_boost_raises_level() {
        let mut node = Node::from_processor(ParametricEq::default());
        node.set_parameter("Mid Gain", 12.0).unwrap();
        let mut buffer = sine(1000.0, 9600);
        node.process(&mut buffer, 9600, 48000.0);
        assert_relative_eq!(tail_peak(&buffer), db_to_linear(12.0), epsilon = 0.05);
    }
}
