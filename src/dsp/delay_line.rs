//! Circular delay line with fractional (Hermite) reads.

use super::math::hermite;

/// Circular buffer read at fractional, modulated positions
///
/// Reads happen before the current sample is written, so a delay of `1.0`
/// returns the most recently written sample. Read positions are clamped to
/// `[1, capacity - 2]`, which keeps every read inside initialized memory.
#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Create a delay line able to hold `max_delay_samples` of history
    pub fn new(max_delay_samples: usize) -> Self {
        let mut line = Self::default();
        line.resize(max_delay_samples);
        line
    }

    /// Reallocate for a new maximum delay, clearing the contents
    pub fn resize(&mut self, max_delay_samples: usize) {
        // Two guard samples for the outer Hermite neighbours
        let size = max_delay_samples.max(1) + 3;
        self.buffer.clear();
        self.buffer.resize(size, 0.0);
        self.write_pos = 0;
    }

    /// Longest delay (in samples) that can be read
    pub fn max_delay(&self) -> f32 {
        self.buffer.len().saturating_sub(2) as f32
    }

    /// Push a sample into the line
    #[inline]
    pub fn write(&mut self, sample: f32) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Sample written `samples_ago` writes ago (1 = most recent)
    #[inline]
    fn tap(&self, samples_ago: usize) -> f32 {
        let len = self.buffer.len();
        let samples_ago = samples_ago.clamp(1, len);
        self.buffer[(self.write_pos + len - samples_ago) % len]
    }

    /// Read with 4-point Hermite interpolation
    pub fn read(&self, delay_samples: f32) -> f32 {
        if self.buffer.len() < 4 {
            return 0.0;
        }
        let delay = if delay_samples.is_finite() {
            delay_samples.clamp(1.0, self.max_delay())
        } else {
            1.0
        };
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;

        let y1 = self.tap(whole);
        // The newer neighbour does not exist yet at the minimum delay
        let y0 = if whole > 1 { self.tap(whole - 1) } else { y1 };
        let y2 = self.tap(whole + 1);
        let y3 = self.tap(whole + 2);
        hermite(frac, y0, y1, y2, y3)
    }

    /// Clear the contents without reallocating
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
