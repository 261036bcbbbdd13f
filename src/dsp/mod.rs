//! DSP primitives
//!
//! Building blocks shared by the node catalog: decibel math, one-pole time
//! constants, Hermite-interpolated delay lines, RBJ biquads, envelope
//! followers and PolyBLEP correction. Nothing here allocates after
//! construction except the explicit `resize` calls.

mod biquad;
mod blep;
mod delay_line;
mod envelope_follower;
mod math;

pub use biquad::{BiquadCoeffs, BiquadShape, BiquadState};
pub use blep::{poly_blep, wrap_phase};
pub use delay_line::DelayLine;
pub use envelope_follower::EnvelopeFollower;
pub use math::{
    db_to_linear, hermite, linear_to_db, ms_to_samples, sanitize, time_coefficient, SILENCE_DB,
};
