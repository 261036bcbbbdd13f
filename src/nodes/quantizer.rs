//! Pitch quantizer for 1 V/octave control signals.

use crate::node::{Parameter, ParameterSet, PortKind, PortLayout, ProcessContext, Processor};

/// A musical scale as semitone offsets from the root
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    pub name: &'static str,
    pub degrees: &'static [u8],
}

/// Selectable scales, indexed by the `Scale` parameter
pub const SCALES: &[Scale] = &[
    Scale {
        name: "Chromatic",
        degrees: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
    },
    Scale {
        name: "Major",
        degrees: &[0, 2, 4, 5, 7, 9, 11],
    },
    Scale {
        name: "Minor",
        degrees: &[0, 2, 3, 5, 7, 8, 10],
    },
    Scale {
        name: "Harmonic Minor",
        degrees: &[0, 2, 3, 5, 7, 8, 11],
    },
    Scale {
        name: "Dorian",
        degrees: &[0, 2, 3, 5, 7, 9, 10],
    },
    Scale {
        name: "Major Pentatonic",
        degrees: &[0, 2, 4, 7, 9],
    },
    Scale {
        name: "Minor Pentatonic",
        degrees: &[0, 3, 5, 7, 10],
    },
    Scale {
        name: "Blues",
        degrees: &[0, 3, 5, 6, 7, 10],
    },
];

/// Snap a semitone number to the nearest note of `scale` rooted at `root`
///
/// Distance is measured circularly between pitch classes, so a note just
/// below the root snaps up to the root of the next octave rather than
/// jumping down. Ties resolve downward.
pub fn quantize_semitone(semitone: i32, scale: &Scale, root: i32) -> i32 {
    let pitch_class = (semitone - root).rem_euclid(12);
    let mut best = 0;
    let mut best_distance = i32::MAX;
    for &degree in scale.degrees {
        // Signed offset in -6..=5 taking pitch_class onto degree
        let offset = (degree as i32 - pitch_class + 6).rem_euclid(12) - 6;
        let distance = offset.abs();
        if distance < best_distance || (distance == best_distance && offset < best) {
            best = offset;
            best_distance = distance;
        }
    }
    semitone + best
}

/// Snaps a V/oct input to the selected scale
///
/// `Changed` goes high for the block in which the quantized note changes.
#[derive(Debug, Default)]
pub struct Quantizer {
    last: Option<i32>,
}

impl Quantizer {
    const SCALE: usize = 0;
    const ROOT: usize = 1;
}

impl Processor for Quantizer {
    fn type_name(&self) -> &'static str {
        "Quantizer"
    }

    fn initialize_ports(&self, ports: &mut PortLayout) {
        ports
            .input("In", PortKind::Control)
            .output("Out", PortKind::Control)
            .output("Changed", PortKind::Trigger);
    }

    fn initialize_parameters(&self, params: &mut ParameterSet) {
        params.add(Parameter::new("Scale", 1.0, 0.0, (SCALES.len() - 1) as f32, ""));
        params.add(Parameter::new("Root", 0.0, 0.0, 11.0, "st"));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>, _buffer: &mut [f32]) {
        let scale = &SCALES[ctx.param_choice(Self::SCALE).min(SCALES.len() - 1)];
        let root = ctx.param_choice(Self::ROOT) as i32;
        let volts = ctx.input(0).clamp(-10.0, 10.0);
        let semitone = quantize_semitone((volts * 12.0).round() as i32, scale, root);

        let changed = self.last != Some(semitone);
        self.last = Some(semitone);
        ctx.set_output(0, semitone as f32 / 12.0);
        ctx.set_output(1, if changed { 1.0 } else { 0.0 });
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn major() -> &'static Scale {
        &SCALES[1]
    }

    #[test_case(0, 0 ; "root stays")]
    #[test_case(1, 0 ; "c sharp ties down to c")]
    #[test_case(6, 5 ; "f sharp ties down to f")]
    #[test_case(11, 11 ; "leading tone stays")]
    #[test_case(13, 12 ; "octave preserved")]
    #[test_case(-1, -1 ; "below zero")]
    fn test_major_in_c(input: i32, expected: i32) {
        assert_eq!(quantize_semitone(input, major(), 0), expected);
    }

    #[test]
    fn test_wraps_to_next_octave_root() {
        let pentatonic = &SCALES[5];
        // A# in C major pentatonic: nearest is A (9) going down, C (12) going up
        assert_eq!(quantize_semitone(10, pentatonic, 0), 9);
        // B is one semitone from the next C
        assert_eq!(quantize_semitone(11, pentatonic, 0), 12);
    }

    #[test]
    fn test_root_transposes_scale() {
        // D major has B and C# around C; the tie goes down
        assert_eq!(quantize_semitone(12, major(), 2), 11);
        assert_eq!(quantize_semitone(13, major(), 2), 13);
    }

    #[test]
    fn test_node_reports_changes() {
        let mut node = Node::from_processor(Quantizer::default());
        let mut buffer = [0.0_f32; 4];
        node.set_input(0, 1.0 / 12.0 * 3.0).unwrap();
        node.process(&mut buffer, 4, 48000.0);
        // E flat snaps down to D in C major
        assert_relative_eq!(node.output_value(0).unwrap(), 2.0 / 12.0);
        assert_eq!(node.output_value(1), Some(1.0));
        node.process(&mut buffer, 4, 48000.0);
        assert_eq!(node.output_value(1), Some(0.0));
        assert_eq!(buffer, [0.0; 4]);
    }
}
