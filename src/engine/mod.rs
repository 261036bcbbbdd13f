//! Offline render host
//!
//! Drives a graph block by block over an in-memory signal, the way a
//! real-time callback would, plus the WAV helpers the CLI uses.

pub mod io;

pub use io::{read_mono, sine, write_mono, MonoAudio};

use crate::graph::Graph;

/// Run `samples` through `graph` in place, `block_size` samples at a time
///
/// The final block may be shorter. A zero block size is treated as 1.
pub fn render(graph: &mut Graph, samples: &mut [f32], sample_rate: f32, block_size: usize) {
    let block_size = block_size.max(1);
    graph.prepare(sample_rate);
    for block in samples.chunks_mut(block_size) {
        let len = block.len();
        graph.process(block, len, sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeRegistry;

    #[test]
    fn test_render_covers_every_sample() {
        let registry = NodeRegistry::with_defaults();
        let mut graph = Graph::new("render");
        let out = graph.add_node(registry.create("AudioOutput").unwrap());
        graph.set_parameter(out, "Volume", 0.5).unwrap();

        let mut samples = vec![1.0_f32; 1000];
        render(&mut graph, &mut samples, 48000.0, 300);
        assert!(samples.iter().all(|&s| s == 0.5));
    }
}
