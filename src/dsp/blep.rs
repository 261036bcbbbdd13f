//! PolyBLEP correction for discontinuous waveforms
//!
//! References:
//! - Välimäki and Huovilainen, "Oscillator and Filter Algorithms for Virtual
//!   Analog Synthesis" (2006)

/// Polynomial band-limited step residual
///
/// `phase` is the normalized phase in [0, 1), `dt` the per-sample phase
/// increment. Returns the correction to subtract from a naive upward step at
/// phase 0; it is non-zero only within one sample of the discontinuity.
#[inline]
pub fn poly_blep(phase: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    if phase < dt {
        // Just after the wrap
        let t = phase / dt;
        2.0 * t - t * t - 1.0
    } else if phase > 1.0 - dt {
        // Just before the wrap
        let t = (phase - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

/// Wrap a phase value into [0, 1)
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    let wrapped = phase - phase.floor();
    if wrapped >= 1.0 {
        0.0
    } else {
        wrapped
    }
}
