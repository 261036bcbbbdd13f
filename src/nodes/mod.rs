//! Built-in node catalog
//!
//! One file per processing family. Every type here implements
//! [`Processor`](crate::node::Processor) and is registered by name in
//! [`NodeRegistry::with_defaults`](crate::registry::NodeRegistry::with_defaults).

mod delay;
mod distortion;
mod dynamics;
mod envelope;
mod filter;
mod io;
mod modulation;
mod oscillator;
mod pitch;
mod quantizer;
mod reverb;
mod sequencing;

pub use delay::{Delay, MAX_DELAY_MS};
pub use distortion::{Distortion, DistortionType};
pub use dynamics::{compression_gain_db, Compressor, Gate, Limiter};
pub use envelope::{shape_progress, Envelope, Stage};
pub use filter::{LadderFilter, ParametricEq};
pub use io::{AudioInput, AudioOutput, Gain, Vca};
pub use modulation::{Chorus, Flanger, Phaser, MAX_PHASER_STAGES};
pub use oscillator::{Lfo, Oscillator, Waveform};
pub use pitch::PitchDetector;
pub use quantizer::{quantize_semitone, Quantizer, Scale, SCALES};
pub use reverb::{Reverb, MAX_PRE_DELAY_MS};
pub use sequencing::{Clock, ClockDivider, Direction, StepSequencer, MAX_STEPS};
