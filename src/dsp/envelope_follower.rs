//! Attack/release envelope follower used by the dynamics nodes.

use super::math::time_coefficient;

/// One-pole level follower with independent attack and release
///
/// Each coefficient is `exp(-1 / (time * sample_rate))`; the follower moves
/// towards a rising input with the attack coefficient and towards a falling
/// input with the release coefficient.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeFollower {
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
}

impl EnvelopeFollower {
    /// Create a follower with the given time constants
    pub fn new(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        let mut follower = Self::default();
        follower.set_times(attack_ms, release_ms, sample_rate);
        follower
    }

    /// Recompute coefficients
    pub fn set_times(&mut self, attack_ms: f32, release_ms: f32, sample_rate: f32) {
        self.attack_coeff = time_coefficient(attack_ms, sample_rate);
        self.release_coeff = time_coefficient(release_ms, sample_rate);
    }

    /// Feed one (already rectified) level and return the envelope
    #[inline]
    pub fn process(&mut self, level: f32) -> f32 {
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;
        if self.envelope < 1.0e-12 {
            self.envelope = 0.0;
        }
        self.envelope
    }

    /// Current envelope value
    pub fn value(&self) -> f32 {
        self.envelope
    }

    /// Clear the envelope
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attack_faster_than_release() {
        let mut follower = EnvelopeFollower::new(1.0, 100.0, 48000.0);
        for _ in 0..480 {
            follower.process(1.0);
        }
        let peak = follower.value();
        assert!(peak > 0.99);

        for _ in 0..480 {
            follower.process(0.0);
        }
        // 10 ms into a 100 ms release
        assert!(follower.value() > 0.85);
    }

    #[test]
    fn test_zero_attack_is_instant() {
        let mut follower = EnvelopeFollower::new(0.0, 50.0, 48000.0);
        assert_eq!(follower.process(0.8), 0.8);
    }
}
