//! WAV file I/O for the render host
//!
//! Graphs run a single mono path, so multichannel input is mixed down on
//! read and output is written as mono 32-bit float.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{PatchcordError, Result};

/// A mono signal and its sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |p, s| p.max(s.abs()))
    }
}

/// Read a WAV file and mix every channel down to mono
///
/// # Errors
/// * `FileReadError` - If the file does not exist
/// * `InvalidAudio` - If the file is not a readable WAV file
pub fn read_mono(path: &Path) -> Result<MonoAudio> {
    if !path.exists() {
        return Err(PatchcordError::FileReadError {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }

    let reader = WavReader::open(path).map_err(|e| PatchcordError::InvalidAudio {
        reason: format!("Failed to open WAV file {}", path.display()),
        source: Some(e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

    Ok(MonoAudio {
        samples: mix_down(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

/// Write mono audio as a 32-bit float WAV file
pub fn write_mono(path: &Path, audio: &MonoAudio) -> Result<()> {
    if audio.sample_rate == 0 {
        return Err(PatchcordError::InvalidAudio {
            reason: "sample rate must be positive".to_string(),
            source: None,
        });
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let write_error = |e: hound::Error| PatchcordError::InvalidAudio {
        reason: format!("Failed to write WAV file {}", path.display()),
        source: Some(e),
    };

    let mut writer = WavWriter::create(path, spec).map_err(write_error)?;
    for &sample in &audio.samples {
        writer.write_sample(sample).map_err(write_error)?;
    }
    writer.finalize().map_err(write_error)
}

/// A unit-amplitude sine, handy for render tests and demos
pub fn sine(frequency: f32, duration_secs: f32, sample_rate: u32) -> MonoAudio {
    let count = (duration_secs * sample_rate as f32).round() as usize;
    let angular = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    MonoAudio {
        samples: (0..count).map(|i| (angular * i as f32).sin()).collect(),
        sample_rate,
    }
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |bits: u16| {
        move |e: hound::Error| PatchcordError::InvalidAudio {
            reason: format!("Failed to read {bits}-bit samples"),
            source: Some(e),
        }
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid(bits_per_sample)),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid(8)),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid(16)),
        // 24-bit is stored as i32 in hound
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid(24)),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(invalid(32)),
        (SampleFormat::Int, bits) => Err(PatchcordError::InvalidAudio {
            reason: format!("{bits}-bit integer audio is not supported"),
            source: None,
        }),
    }
}

/// Average interleaved frames into one channel
fn mix_down(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}
