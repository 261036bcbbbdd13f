//! Host boundary and level nodes: AudioInput, AudioOutput, Gain, Vca.

use crate::dsp::{db_to_linear, time_coefficient};
use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// Gain changes glide over this time constant to avoid zipper noise
const GAIN_SMOOTHING_MS: f32 = 5.0;

// ============================================================================
// AudioInput
// ============================================================================

/// Entry point of the host signal
///
/// The host places its input block in the scratch buffer before the graph
/// runs; this node applies an input trim and publishes the last sample.
#[derive(Debug, Default)]
pub struct AudioInput;

impl AudioInput {
    const LEVEL: usize = 0;
}

impl Processor for AudioInput {
    fn type_name(&self) -> &'static str {
        "AudioInput"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports.output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Level", 1.0, 0.0, 2.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let level = ctx.param(Self::LEVEL);
        if level != 1.0 {
            buffer.iter_mut().for_each(|s| *s *= level);
        }
        ctx.set_output(0, buffer[buffer.len() - 1]);
    }
}

// ============================================================================
// AudioOutput
// ============================================================================

/// Exit point of the graph: master volume and block peak meter
#[derive(Debug, Default)]
pub struct AudioOutput;

impl AudioOutput {
    const VOLUME: usize = 0;
}

impl Processor for AudioOutput {
    fn type_name(&self) -> &'static str {
        "AudioOutput"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Peak", PortKind::Control);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Volume", 1.0, 0.0, 2.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let volume = ctx.param(Self::VOLUME);
        let mut peak = 0.0_f32;
        for sample in buffer.iter_mut() {
            *sample *= volume;
            peak = peak.max(sample.abs());
        }
        ctx.set_output(0, peak);
    }
}

// ============================================================================
// Gain
// ============================================================================

/// Gain stage in decibels with a dB-offset CV input
///
/// The first block snaps to the target gain; later changes are smoothed per
/// sample, so a constant setting yields identical output for any block size.
#[derive(Debug)]
pub struct Gain {
    current: Option<f32>,
    coeff: f32,
}

impl Gain {
    const GAIN: usize = 0;
    const GAIN_CV: usize = 1;

    pub fn new() -> Self {
        Self {
            current: None,
            coeff: 0.0,
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Gain {
    fn type_name(&self) -> &'static str {
        "Gain"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .input("Gain CV", PortKind::Control)
            .output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Gain", 0.0, -96.0, 24.0, "dB"));
    }

    fn prepare(&mut self, sample_rate: f32) {
        self.coeff = time_coefficient(GAIN_SMOOTHING_MS, sample_rate);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let db = (ctx.param(Self::GAIN) + ctx.input(Self::GAIN_CV)).clamp(-96.0, 24.0);
        let target = db_to_linear(db);
        let mut gain = *self.current.get_or_insert(target);

        if gain == target {
            buffer.iter_mut().for_each(|s| *s *= target);
        } else {
            for sample in buffer.iter_mut() {
                gain = target + self.coeff * (gain - target);
                *sample *= gain;
            }
            if (gain - target).abs() < 1.0e-6 {
                gain = target;
            }
        }

        self.current = Some(gain);
        ctx.set_output(0, buffer[buffer.len() - 1]);
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

// ============================================================================
// VCA
// ============================================================================

/// Voltage-controlled amplifier
///
/// Scales the signal by `(Offset + CV) * Level`, never below zero. CV arrives
/// once per block, so the gain ramps linearly from the previous block's value
/// to the new one across the block.
#[derive(Debug, Default)]
pub struct Vca {
    previous: Option<f32>,
}

impl Vca {
    const LEVEL: usize = 0;
    const OFFSET: usize = 1;
    const CV: usize = 1;
}

impl Processor for Vca {
    fn type_name(&self) -> &'static str {
        "VCA"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .input("CV", PortKind::Control)
            .output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Level", 1.0, 0.0, 2.0, ""));
        params.add(Parameter::new("Offset", 0.0, 0.0, 1.0, ""));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let control = ctx.param(Self::OFFSET) + ctx.input(Self::CV);
        let target = (control * ctx.param(Self::LEVEL)).max(0.0);
        let start = self.previous.unwrap_or(target);

        if start == target {
            buffer.iter_mut().for_each(|s| *s *= target);
        } else {
            let step = (target - start) / buffer.len() as f32;
            for (i, sample) in buffer.iter_mut().enumerate() {
                *sample *= start + step * (i + 1) as f32;
            }
        }

        self.previous = Some(target);
        ctx.set_output(0, buffer[buffer.len() - 1]);
    }

    fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use approx::assert_relative_eq;

    #[test]
    fn test_gain_applies_linear_gain() {
        let mut node = Node::from_processor(Gain::new());
        node.set_parameter("Gain", -6.0).unwrap();
        let mut buffer = [1.0_f32; 16];
        node.process(&mut buffer, 16, 48000.0);
        for s in buffer {
            assert_relative_eq!(s, db_to_linear(-6.0), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_gain_cv_offsets_in_db() {
        let mut node = Node::from_processor(Gain::new());
        node.set_input(1, -20.0).unwrap();
        let mut buffer = [1.0_f32; 4];
        node.process(&mut buffer, 4, 48000.0);
        assert_relative_eq!(buffer[3], 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_gain_change_is_smoothed() {
        let mut node = Node::from_processor(Gain::new());
        let mut buffer = [1.0_f32; 8];
        node.process(&mut buffer, 8, 48000.0);
        node.set_parameter("Gain", -96.0).unwrap();
        let mut buffer = [1.0_f32; 8];
        node.process(&mut buffer, 8, 48000.0);
        // Heading down, but nowhere near the target after 8 samples
        assert!(buffer[0] < 1.0);
        assert!(buffer[7] < buffer[0]);
        assert!(buffer[7] > 0.5);
    }

    #[test]
    fn test_output_peak_meter() {
        let mut node = Node::from_processor(AudioOutput);
        node.set_parameter("Volume", 0.5).unwrap();
        let mut buffer = [0.2_f32, -0.8, 0.4];
        node.process(&mut buffer, 3, 48000.0);
        assert_relative_eq!(buffer[1], -0.4);
        assert_relative_eq!(node.output_value(0).unwrap(), 0.4);
    }

    #[test]
    fn test_input_trim() {
        let mut node = Node::from_processor(AudioInput);
        node.set_parameter("Level", 2.0).unwrap();
        let mut buffer = [0.25_f32; 2];
        node.process(&mut buffer, 2, 44100.0);
        assert_eq!(buffer, [0.5, 0.5]);
        assert_eq!(node.output_value(0), Some(0.5));
    }

    #[test]
    fn test_vca_is_silent_without_cv() {
        let mut node = Node::from_processor(Vca::default());
        let mut buffer = [0.5_f32; 8];
        node.process(&mut buffer, 8, 48000.0);
        assert_eq!(buffer, [0.0; 8]);
    }

    #[test]
    fn test_vca_ramps_to_new_cv_across_the_block() {
        let mut node = Node::from_processor(Vca::default());
        node.set_input(1, 1.0).unwrap();
        let mut buffer = [1.0_f32; 4];
        node.process(&mut buffer, 4, 48000.0);
        assert_eq!(buffer, [1.0; 4]);

        node.set_input(1, 0.0).unwrap();
        let mut buffer = [1.0_f32; 4];
        node.process(&mut buffer, 4, 48000.0);
        assert_relative_eq!(buffer[0], 0.75);
        assert_relative_eq!(buffer[1], 0.5);
        assert_eq!(buffer[3], 0.0);
    }

    #[test]
    fn test_vca_offset_and_level() {
        let mut node = Node::from_processor(Vca::default());
        node.set_parameter("Offset", 0.5).unwrap();
        node.set_parameter("Level", 2.0).unwrap();
        node.set_input(1, -2.0).unwrap();
        let mut buffer = [1.0_f32; 2];
        node.process(&mut buffer, 2, 48000.0);
        assert_eq!(buffer, [0.0; 2]);
    }
}
