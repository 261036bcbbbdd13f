//! Small numeric helpers shared by the node catalog.

/// Floor used when converting silence to decibels
pub const SILENCE_DB: f32 = -120.0;

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Zero and negative input is floored at [`SILENCE_DB`].
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        (20.0 * linear.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

/// One-pole smoothing coefficient for a time constant
///
/// `coeff = exp(-1 / (time_seconds * sample_rate))`. A zero or negative
/// time yields 0.0 (instant response).
#[inline]
pub fn time_coefficient(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms / 1000.0 * sample_rate;
    if samples <= 0.0 || !samples.is_finite() {
        return 0.0;
    }
    (-1.0 / samples).exp()
}

/// Convert milliseconds to a sample count (at least `min`)
#[inline]
pub fn ms_to_samples(time_ms: f32, sample_rate: f32, min: usize) -> usize {
    let samples = (time_ms.max(0.0) / 1000.0 * sample_rate).round();
    (samples as usize).max(min)
}

/// 4-point, 3rd-order Hermite interpolation
///
/// `y1` is returned at `frac = 0`, `y2` at `frac = 1`; `y0` and `y3` are the
/// outer neighbours.
#[inline]
pub fn hermite(frac: f32, y0: f32, y1: f32, y2: f32, y3: f32) -> f32 {
    let c0 = y1;
    let c1 = 0.5 * (y2 - y0);
    let c2 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c3 = 0.5 * (y3 - y0) + 1.5 * (y1 - y2);
    ((c3 * frac + c2) * frac + c1) * frac + c0
}

/// Replace NaN/Inf and denormal-range values with 0.0
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() && x.abs() > 1.0e-20 {
        x
    } else {
        0.0
    }
}
