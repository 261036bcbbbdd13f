//! Dynamics processors: Compressor, Limiter and Gate.
//!
//! All three share the same detector: a rectified (or RMS) level fed through
//! an [`EnvelopeFollower`] with independent attack and release constants.

use crate::dsp::{
    db_to_linear, linear_to_db, ms_to_samples, sanitize, time_coefficient, DelayLine,
    EnvelopeFollower,
};
use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// Longest look-ahead any dynamics node accepts
const MAX_LOOKAHEAD_MS: f32 = 10.0;

/// Longest RMS detection window
const MAX_RMS_WINDOW_MS: f32 = 100.0;

/// Static gain curve of a compressor, in dB
///
/// Returns the (non-positive) gain change for a detector level. Within the
/// knee the curve blends quadratically between unity and full ratio.
pub fn compression_gain_db(level_db: f32, threshold_db: f32, ratio: f32, knee_db: f32) -> f32 {
    let slope = 1.0 / ratio.max(1.0) - 1.0;
    let over = level_db - threshold_db;
    if knee_db > 0.0 && 2.0 * over.abs() <= knee_db {
        let x = over + knee_db / 2.0;
        slope * x * x / (2.0 * knee_db)
    } else if over > 0.0 {
        slope * over
    } else {
        0.0
    }
}

/// Look-ahead path: delays the signal by a whole number of samples
#[derive(Debug, Default)]
struct Lookahead {
    line: DelayLine,
}

impl Lookahead {
    fn prepare(&mut self, sample_rate: f32) {
        self.line.resize(ms_to_samples(MAX_LOOKAHEAD_MS, sample_rate, 1));
    }

    /// Push `input`, return the sample from `samples` ago (or `input` at 0)
    ///
    /// The line is fed even at zero delay so raising the look-ahead later
    /// reads recent history.
    #[inline]
    fn process(&mut self, input: f32, samples: usize) -> f32 {
        let delayed = if samples == 0 {
            input
        } else {
            self.line.read(samples as f32)
        };
        self.line.write(input);
        delayed
    }

    fn clear(&mut self) {
        self.line.clear();
    }
}

// ============================================================================
// Compressor
// ============================================================================

/// Level detection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Detection {
    Peak,
    Rms,
}

/// Sliding-window mean square detector
#[derive(Debug, Default)]
struct RmsWindow {
    squares: Vec<f32>,
    len: usize,
    pos: usize,
    sum: f32,
}

impl RmsWindow {
    fn prepare(&mut self, sample_rate: f32) {
        self.squares = vec![0.0; ms_to_samples(MAX_RMS_WINDOW_MS, sample_rate, 1)];
        self.len = 0;
        self.pos = 0;
        self.sum = 0.0;
    }

    /// Change the window length, restarting the running sum
    fn set_len(&mut self, len: usize) {
        let len = len.clamp(1, self.squares.len().max(1));
        if len != self.len {
            self.len = len;
            self.clear();
        }
    }

    #[inline]
    fn process(&mut self, sample: f32) -> f32 {
        if self.squares.is_empty() {
            return sample.abs();
        }
        let square = sample * sample;
        self.sum += square - self.squares[self.pos];
        self.squares[self.pos] = square;
        self.pos = (self.pos + 1) % self.len;
        (self.sum.max(0.0) / self.len as f32).sqrt()
    }

    fn clear(&mut self) {
        self.squares.fill(0.0);
        self.pos = 0;
        self.sum = 0.0;
    }
}

/// Feed-forward compressor with soft knee, RMS detection and look-ahead
#[derive(Debug, Default)]
pub struct Compressor {
    follower: EnvelopeFollower,
    rms: RmsWindow,
    lookahead: Lookahead,
}

impl Compressor {
    const THRESHOLD: usize = 0;
    const RATIO: usize = 1;
    const ATTACK: usize = 2;
    const RELEASE: usize = 3;
    const KNEE: usize = 4;
    const MAKEUP: usize = 5;
    const LOOKAHEAD: usize = 6;
    const DETECTION: usize = 7;
    const RMS_WINDOW: usize = 8;
}

impl Processor for Compressor {
    fn type_name(&self) -> &'static str {
        "Compressor"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Out", PortKind::Audio)
            .output("Gain Reduction", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Threshold", -20.0, -60.0, 0.0, "dB"));
        params.add(Parameter::new("Ratio", 4.0, 1.0, 20.0, ":1"));
        params.add(Parameter::new("Attack", 10.0, 0.1, 200.0, "ms").logarithmic());
        params.add(Parameter::new("Release", 100.0, 5.0, 2000.0, "ms").logarithmic());
        params.add(Parameter::new("Knee", 6.0, 0.0, 24.0, "dB"));
        params.add(Parameter::new("Makeup", 0.0, 0.0, 24.0, "dB"));
        params.add(Parameter::new("Lookahead", 0.0, 0.0, MAX_LOOKAHEAD_MS, "ms"));
        params.add(Parameter::new("Detection", 0.0, 0.0, 1.0, ""));
        params.add(Parameter::new("RMS Window", 10.0, 1.0, MAX_RMS_WINDOW_MS, "ms"));
    }

    fn prepare(&mut self, sample_rate: f32) {
        self.rms.prepare(sample_rate);
        self.lookahead.prepare(sample_rate);
        self.follower.reset();
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate();
        self.follower
            .set_times(ctx.param(Self::ATTACK), ctx.param(Self::RELEASE), sr);
        let threshold = ctx.param(Self::THRESHOLD);
        let ratio = ctx.param(Self::RATIO);
        let knee = ctx.param(Self::KNEE);
        let makeup = ctx.param(Self::MAKEUP);
        let lookahead = ms_to_samples(ctx.param(Self::LOOKAHEAD), sr, 0);
        let detection = if ctx.param_choice(Self::DETECTION) == 1 {
            Detection::Rms
        } else {
            Detection::Peak
        };
        if detection == Detection::Rms {
            self.rms
                .set_len(ms_to_samples(ctx.param(Self::RMS_WINDOW), sr, 1));
        }

        let mut reduction_db = 0.0;
        for sample in buffer.iter_mut() {
            let input = *sample;
            let level = match detection {
                Detection::Peak => input.abs(),
                Detection::Rms => self.rms.process(input),
            };
            let envelope = self.follower.process(level);
            reduction_db = compression_gain_db(linear_to_db(envelope), threshold, ratio, knee);
            let delayed = self.lookahead.process(input, lookahead);
            *sample = delayed * db_to_linear(reduction_db + makeup);
        }

        ctx.set_output(0, buffer[buffer.len() - 1]);
        ctx.set_output(1, -reduction_db);
    }

    fn reset(&mut self) {
        self.follower.reset();
        self.rms.clear();
        self.lookahead.clear();
    }
}

// ============================================================================
// Limiter
// ============================================================================

/// Brick-wall limiter: instant attack, exponential release, hard ceiling
#[derive(Debug, Default)]
pub struct Limiter {
    envelope: f32,
    lookahead: Lookahead,
}

impl Limiter {
    const CEILING: usize = 0;
    const RELEASE: usize = 1;
    const LOOKAHEAD: usize = 2;
}

impl Processor for Limiter {
    fn type_name(&self) -> &'static str {
        "Limiter"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Out", PortKind::Audio)
            .output("Gain Reduction", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Ceiling", -0.3, -24.0, 0.0, "dB"));
        params.add(Parameter::new("Release", 50.0, 1.0, 1000.0, "ms").logarithmic());
        params.add(Parameter::new("Lookahead", 1.5, 0.0, MAX_LOOKAHEAD_MS, "ms"));
    }

    fn prepare(&mut self, sample_rate: f32) {
        self.lookahead.prepare(sample_rate);
        self.envelope = 0.0;
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate();
        let ceiling = db_to_linear(ctx.param(Self::CEILING));
        let release = time_coefficient(ctx.param(Self::RELEASE), sr);
        let lookahead = ms_to_samples(ctx.param(Self::LOOKAHEAD), sr, 0);

        let mut gain = 1.0;
        for sample in buffer.iter_mut() {
            let input = *sample;
            self.envelope = input.abs().max(release * self.envelope);
            gain = if self.envelope > ceiling {
                ceiling / self.envelope
            } else {
                1.0
            };
            let delayed = self.lookahead.process(input, lookahead);
            *sample = (delayed * gain).clamp(-ceiling, ceiling);
        }
        self.envelope = sanitize(self.envelope);

        ctx.set_output(0, buffer[buffer.len() - 1]);
        ctx.set_output(1, -linear_to_db(gain));
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.lookahead.clear();
    }
}

// ============================================================================
// Gate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Closed,
    Attack,
    Open,
    Hold,
    Release,
}

/// Noise gate with hysteresis and a hold counter
///
/// Opens when the detector rises above `Threshold`, starts closing only
/// once it falls below `Threshold - Hysteresis` and the hold time has run
/// out. While closed the signal is attenuated by `Range`.
#[derive(Debug)]
pub struct Gate {
    state: GateState,
    detector: EnvelopeFollower,
    /// Applied gain; `None` until the first block fixes the range floor
    gain: Option<f32>,
    hold_counter: usize,
}

impl Gate {
    const THRESHOLD: usize = 0;
    const HYSTERESIS: usize = 1;
    const ATTACK: usize = 2;
    const HOLD: usize = 3;
    const RELEASE: usize = 4;
    const RANGE: usize = 5;

    /// Detector time constants (fast peak response, slow decay)
    const DETECTOR_ATTACK_MS: f32 = 0.1;
    const DETECTOR_RELEASE_MS: f32 = 50.0;

    pub fn new() -> Self {
        Self {
            state: GateState::Closed,
            detector: EnvelopeFollower::default(),
            gain: None,
            hold_counter: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            GateState::Attack | GateState::Open | GateState::Hold
        )
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Gate {
    fn type_name(&self) -> &'static str {
        "Gate"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Out", PortKind::Audio)
            .output("Open", PortKind::Gate);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Threshold", -40.0, -80.0, 0.0, "dB"));
        params.add(Parameter::new("Hysteresis", 6.0, 0.0, 20.0, "dB"));
        params.add(Parameter::new("Attack", 1.0, 0.1, 50.0, "ms"));
        params.add(Parameter::new("Hold", 10.0, 0.0, 500.0, "ms"));
        params.add(Parameter::new("Release", 50.0, 5.0, 2000.0, "ms").logarithmic());
        params.add(Parameter::new("Range", -80.0, -80.0, 0.0, "dB"));
    }

    fn prepare(&mut self, sample_rate: f32) {
        self.detector.set_times(
            Self::DETECTOR_ATTACK_MS,
            Self::DETECTOR_RELEASE_MS,
            sample_rate,
        );
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate();
        let threshold_db = ctx.param(Self::THRESHOLD);
        let open_at = db_to_linear(threshold_db);
        let close_at = db_to_linear(threshold_db - ctx.param(Self::HYSTERESIS));
        let attack = time_coefficient(ctx.param(Self::ATTACK), sr);
        let release = time_coefficient(ctx.param(Self::RELEASE), sr);
        let hold_samples = ms_to_samples(ctx.param(Self::HOLD), sr, 0);
        let floor = db_to_linear(ctx.param(Self::RANGE));

        let mut gain = *self.gain.get_or_insert(floor);
        for sample in buffer.iter_mut() {
            let envelope = self.detector.process(sample.abs());

            let target = match self.state {
                GateState::Closed => {
                    if envelope > open_at {
                        self.state = GateState::Attack;
                    }
                    floor
                }
                GateState::Attack => {
                    if gain >= 0.99 {
                        self.state = GateState::Open;
                    }
                    1.0
                }
                GateState::Open => {
                    if envelope < close_at {
                        self.state = GateState::Hold;
                        self.hold_counter = hold_samples;
                    }
                    1.0
                }
                GateState::Hold => {
                    if envelope > open_at {
                        self.state = GateState::Open;
                    } else if self.hold_counter > 0 {
                        self.hold_counter -= 1;
                    } else {
                        self.state = GateState::Release;
                    }
                    1.0
                }
                GateState::Release => {
                    if envelope > open_at {
                        self.state = GateState::Attack;
                        1.0
                    } else {
                        if gain <= floor + 0.001 {
                            self.state = GateState::Closed;
                        }
                        floor
                    }
                }
            };

            let coeff = if target > gain { attack } else { release };
            gain = target + coeff * (gain - target);
            *sample *= gain;
        }

        self.gain = Some(gain);
        ctx.set_output(0, buffer[buffer.len() - 1]);
        ctx.set_output(1, if self.is_open() { 1.0 } else { 0.0 });
    }

    fn reset(&mut self) {
        self.state = GateState::Closed;
        self.detector.reset();
        self.gain = None;
        self.hold_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn sine(amplitude: f32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|n| amplitude * (std::f32::consts::TAU * 440.0 * n as f32 / 48000.0).sin())
            .collect()
    }

    fn peak(buffer: &[f32]) -> f32 {
        buffer.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_gain_curve_hard_knee() {
        assert_eq!(compression_gain_db(-30.0, -20.0, 4.0, 0.0), 0.0);
        assert_relative_eq!(compression_gain_db(-10.0, -20.0, 4.0, 0.0), -7.5);
    }

    #[test]
    fn test_gain_curve_soft_knee_is_continuous() {
        let (t, r, w) = (-20.0, 4.0, 6.0);
        let below = compression_gain_db(t - w / 2.0, t, r, w);
        let above = compression_gain_db(t + w / 2.0, t, r, w);
        assert_relative_eq!(below, 0.0, epsilon = 1e-6);
        assert_relative_eq!(above, (1.0 / r - 1.0) * w / 2.0, epsilon = 1e-5);
    }

    #[test_case(0.0 ; "peak detection")]
    #[test_case(1.0 ; "rms detection")]
    fn test_unity_ratio_is_transparent(detection: f32) {
        let mut node = Node::from_processor(Compressor::default());
        node.set_parameter("Ratio", 1.0).unwrap();
        node.set_parameter("Threshold", -60.0).unwrap();
        node.set_parameter("Makeup", 6.0).unwrap();
        node.set_parameter("Detection", detection).unwrap();
        let input = sine(1.0, 4800);
        let mut buffer = input.clone();
        node.process(&mut buffer, 4800, 48000.0);
        let makeup = db_to_linear(6.0);
        for (x, y) in input.iter().zip(&buffer) {
            assert_relative_eq!(*y, x * makeup, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let mut node = Node::from_processor(Compressor::default());
        node.set_parameter("Threshold", -20.0).unwrap();
        node.set_parameter("Ratio", 10.0).unwrap();
        node.set_parameter("Attack", 0.1).unwrap();
        let mut buffer = sine(1.0, 9600);
        node.process(&mut buffer, 9600, 48000.0);
        assert!(peak(&buffer[4800..]) < 0.5);
        assert!(node.output_value(1).unwrap() > 5.0);
    }

    #[test]
    fn test_lookahead_delays_signal() {
        let mut node = Node::from_processor(Compressor::default());
        node.set_parameter("Ratio", 1.0).unwrap();
        node.set_parameter("Lookahead", 1.0).unwrap();
        let mut buffer = vec![0.0; 100];
        buffer[0] = 1.0;
        node.process(&mut buffer, 100, 48000.0);
        // 1 ms at 48 kHz
        assert_relative_eq!(buffer[48], 1.0, epsilon = 1e-6);
        assert_eq!(buffer[0], 0.0);
    }

    #[test]
    fn test_raising_lookahead_reads_recent_input() {
        let mut node = Node::from_processor(Compressor::default());
        node.set_parameter("Ratio", 1.0).unwrap();
        let mut buffer = vec![0.5_f32; 100];
        node.process(&mut buffer, 100, 48000.0);
        assert_eq!(buffer[99], 0.5);

        node.set_parameter("Lookahead", 1.0).unwrap();
        let mut buffer = vec![0.0_f32; 100];
        node.process(&mut buffer, 100, 48000.0);
        // The first 48 samples come from the previous block
        for s in &buffer[..48] {
            assert_relative_eq!(*s, 0.5, epsilon = 1e-6);
        }
        assert_relative_eq!(buffer[48], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_limiter_holds_ceiling() {
        let mut node = Node::from_processor(Limiter::default());
        node.set_parameter("Ceiling", -6.0).unwrap();
        let mut buffer = sine(2.0, 4800);
        node.process(&mut buffer, 4800, 48000.0);
        assert!(peak(&buffer) <= db_to_linear(-6.0) + 1e-6);
        assert!(node.output_value(1).unwrap() > 0.0);
    }

    #[test]
    fn test_gate_passes_loud_signal() {
        let mut node = Node::from_processor(Gate::new());
        let mut buffer = sine(0.5, 4800);
        node.process(&mut buffer, 4800, 48000.0);
        assert!(peak(&buffer[2400..]) > 0.45);
        assert_eq!(node.output_value(1), Some(1.0));
    }

    #[test]
    fn test_gate_stays_closed_below_threshold() {
        let mut node = Node::from_processor(Gate::new());
        node.set_parameter("Range", -60.0).unwrap();
        let floor = db_to_linear(-60.0);
        let level = db_to_linear(-50.0);
        let mut last = None;
        // Well past the 10 ms hold time
        for _ in 0..20 {
            let mut buffer = [level; 480];
            node.process(&mut buffer, 480, 48000.0);
            for s in buffer {
                assert_relative_eq!(s, level * floor, epsilon = 1e-9);
            }
            if let Some(prev) = last {
                assert_eq!(prev, buffer[479]);
            }
            last = Some(buffer[479]);
            assert_eq!(node.output_value(1), Some(0.0));
        }
    }
}
