//! Autocorrelation pitch detector.

use std::f32::consts::PI;

use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// Analysis frame length in samples
const WINDOW: usize = 2048;
/// Samples between analyses
const HOP: usize = 512;
/// A candidate lag must reach this share of the best correlation
const PEAK_RATIO: f32 = 0.9;

/// Estimates the fundamental of the incoming audio
///
/// Every [`HOP`] samples the most recent [`WINDOW`] samples are Hann
/// windowed and correlated with themselves over the lag range implied by
/// `Min Freq`..`Max Freq`. Each lag is normalized by the frame energy and by
/// the window's own autocorrelation, so a periodic signal scores close to 1
/// at its period. The shortest lag that is a local peak within
/// [`PEAK_RATIO`] of the best one wins, which avoids octave-down errors;
/// parabolic interpolation refines it. Below `Threshold` confidence the
/// detector reports 0 Hz. Audio passes through.
#[derive(Debug, Default)]
pub struct PitchDetector {
    ring: Vec<f32>,
    write_pos: usize,
    since_analysis: usize,
    window: Vec<f32>,
    /// Autocorrelation of `window`, normalized to 1 at lag 0
    window_correlation: Vec<f32>,
    frame: Vec<f32>,
    correlation: Vec<f32>,
    frequency: f32,
    confidence: f32,
}

impl PitchDetector {
    const MIN_FREQ: usize = 0;
    const MAX_FREQ: usize = 1;
    const THRESHOLD: usize = 2;

    /// Run one analysis over the latest frame
    fn analyze(&mut self, sample_rate: f32, min_freq: f32, max_freq: f32, threshold: f32) {
        let len = self.ring.len();
        for (i, (slot, w)) in self.frame.iter_mut().zip(&self.window).enumerate() {
            *slot = self.ring[(self.write_pos + len - WINDOW + i) % len] * w;
        }

        let (lo, hi) = if min_freq <= max_freq {
            (min_freq, max_freq)
        } else {
            (max_freq, min_freq)
        };
        let lag_min = ((sample_rate / hi.max(1.0)) as usize).max(2);
        let lag_max = ((sample_rate / lo.max(1.0)) as usize).min(WINDOW / 2);
        if lag_max <= lag_min + 1 {
            self.frequency = 0.0;
            self.confidence = 0.0;
            return;
        }

        let energy: f32 = self.frame.iter().map(|s| s * s).sum();
        if energy <= 1.0e-12 {
            self.frequency = 0.0;
            self.confidence = 0.0;
            return;
        }

        // correlation[k] holds the lag lag_min - 1 + k
        let count = lag_max - lag_min + 3;
        let mut best = 0.0_f32;
        for k in 0..count {
            let lag = lag_min - 1 + k;
            let window_r = self.window_correlation[lag];
            let r = if window_r > 1.0e-6 {
                autocorrelation(&self.frame, lag) / energy / window_r
            } else {
                0.0
            };
            self.correlation[k] = r;
            best = best.max(r);
        }

        let mut chosen = None;
        for k in 1..count - 1 {
            let r = self.correlation[k];
            if r >= best * PEAK_RATIO
                && r >= self.correlation[k - 1]
                && r >= self.correlation[k + 1]
            {
                chosen = Some(k);
                break;
            }
        }

        match chosen {
            Some(k) if best > 0.0 && self.correlation[k] >= threshold => {
                let (a, b, c) = (
                    self.correlation[k - 1],
                    self.correlation[k],
                    self.correlation[k + 1],
                );
                let denom = a - 2.0 * b + c;
                let shift = if denom.abs() > 1.0e-12 {
                    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
                } else {
                    0.0
                };
                let lag = (lag_min - 1 + k) as f32 + shift;
                self.frequency = sample_rate / lag;
                self.confidence = b.clamp(0.0, 1.0);
            }
            _ => {
                self.frequency = 0.0;
                self.confidence = best.clamp(0.0, 1.0);
            }
        }
    }
}

/// Raw autocorrelation of `frame` at `lag`
fn autocorrelation(frame: &[f32], lag: usize) -> f32 {
    if lag >= frame.len() {
        return 0.0;
    }
    frame.iter().zip(&frame[lag..]).map(|(a, b)| a * b).sum()
}

impl Processor for PitchDetector {
    fn type_name(&self) -> &'static str {
        "PitchDetector"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Frequency", PortKind::Control)
            .output("Confidence", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Min Freq", 60.0, 30.0, 1000.0, "Hz").logarithmic());
        params.add(Parameter::new("Max Freq", 1500.0, 100.0, 4000.0, "Hz").logarithmic());
        params.add(Parameter::new("Threshold", 0.5, 0.0, 1.0, ""));
    }

    fn prepare(&mut self, _sample_rate: f32) {
        self.ring = vec![0.0; WINDOW * 2];
        self.frame = vec![0.0; WINDOW];
        self.correlation = vec![0.0; WINDOW / 2 + 3];
        self.window = (0..WINDOW)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (WINDOW - 1) as f32).cos())
            .collect();
        let zero_lag = autocorrelation(&self.window, 0);
        self.window_correlation = (0..self.correlation.len())
            .map(|lag| autocorrelation(&self.window, lag) / zero_lag)
            .collect();
        self.write_pos = 0;
        self.since_analysis = 0;
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let sr = ctx.sample_rate();
        let min_freq = ctx.param(Self::MIN_FREQ);
        let max_freq = ctx.param(Self::MAX_FREQ);
        let threshold = ctx.param(Self::THRESHOLD);

        let len = self.ring.len();
        for &sample in buffer.iter() {
            self.ring[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % len;
            self.since_analysis += 1;
            if self.since_analysis >= HOP {
                self.since_analysis = 0;
                self.analyze(sr, min_freq, max_freq, threshold);
            }
        }

        ctx.set_output(0, self.frequency);
        ctx.set_output(1, self.confidence);
    }

    fn reset(&mut self) {
        self.ring.fill(0.0);
        self.write_pos = 0;
        self.since_analysis = 0;
        self.frequency = 0.0;
        self.confidence = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn detect(frequency: f32) -> (f32, f32) {
        let mut node = Node::from_processor(PitchDetector::default());
        let mut buffer: Vec<f32> = (0..8192)
            .map(|n| 0.8 * (2.0 * PI * frequency * n as f32 / 48000.0).sin())
            .collect();
        node.process(&mut buffer, 8192, 48000.0);
        (node.output_value(0).unwrap(), node.output_value(1).unwrap())
    }

    #[test_case(110.0)]
    #[test_case(220.0)]
    #[test_case(440.0)]
    #[test_case(880.0)]
    fn test_detects_sine(frequency: f32) {
        let (detected, confidence) = detect(frequency);
        assert_relative_eq!(detected, frequency, max_relative = 0.02);
        assert!(confidence > 0.8, "confidence {confidence}");
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let (detected, confidence) = detect(0.0);
        assert_eq!(detected, 0.0);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_audio_passes_through() {
        let mut node = Node::from_processor(PitchDetector::default());
        let mut buffer = [0.1_f32, 0.2, 0.3];
        node.process(&mut buffer, 3, 48000.0);
        assert_eq!(buffer, [0.1, 0.2, 0.3]);
    }
}
