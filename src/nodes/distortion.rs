//! Waveshaping distortion
//!
//! Four shaping families, selected by the `Type` parameter:
//! - **Tape**: `tanh(x * (1 + drive * 4))` with a touch of asymmetry for even harmonics
//! - **Tube**: `x / (1 + |x|^(1 + drive))`, a soft knee
//! - **Transistor**: `x * g / (1 + |x * g|)`, harder and odd-heavy
//! - **Hard Clip**: `clamp(x * (1 + drive * 10), -1, 1)`

use crate::dsp::db_to_linear;
use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// Waveshaping family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistortionType {
    #[default]
    Tape,
    Tube,
    Transistor,
    HardClip,
}

impl DistortionType {
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => DistortionType::Tube,
            2 => DistortionType::Transistor,
            3 => DistortionType::HardClip,
            _ => DistortionType::Tape,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DistortionType::Tape => "Tape",
            DistortionType::Tube => "Tube",
            DistortionType::Transistor => "Transistor",
            DistortionType::HardClip => "Hard Clip",
        }
    }

    /// Shape one sample; `drive` is 0..1
    #[inline]
    pub fn shape(&self, x: f32, drive: f32) -> f32 {
        match self {
            DistortionType::Tape => {
                let shaped = (x * (1.0 + drive * 4.0)).tanh();
                shaped + 0.1 * drive * shaped * shaped
            }
            DistortionType::Tube => x / (1.0 + x.abs().powf(1.0 + drive)),
            DistortionType::Transistor => {
                let driven = x * (1.0 + drive * 3.0);
                driven / (1.0 + driven.abs())
            }
            DistortionType::HardClip => (x * (1.0 + drive * 10.0)).clamp(-1.0, 1.0),
        }
    }
}

/// Stateless waveshaper with dry/wet mix and output trim
#[derive(Debug, Default)]
pub struct Distortion;

impl Distortion {
    const TYPE: usize = 0;
    const DRIVE: usize = 1;
    const MIX: usize = 2;
    const OUTPUT: usize = 3;
}

impl Processor for Distortion {
    fn type_name(&self) -> &'static str {
        "Distortion"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Audio)
            .output("Out", PortKind::Audio);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Type", 0.0, 0.0, 3.0, ""));
        params.add(Parameter::new("Drive", 0.5, 0.0, 1.0, ""));
        params.add(Parameter::new("Mix", 1.0, 0.0, 1.0, ""));
        params.add(Parameter::new("Output", 0.0, -24.0, 24.0, "dB"));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, buffer: &mut [f32]) {
        let kind = DistortionType::from_index(ctx.param_choice(Self::TYPE));
        let drive = ctx.param(Self::DRIVE);
        let wet = ctx.param(Self::MIX);
        let dry = 1.0 - wet;
        let output = db_to_linear(ctx.param(Self::OUTPUT));

        for sample in buffer.iter_mut() {
            let x = *sample;
            *sample = (x * dry + kind.shape(x, drive) * wet) * output;
        }
        ctx.set_output(0, buffer[buffer.len() - 1]);
    }
}
