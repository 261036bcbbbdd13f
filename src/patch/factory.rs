//! Built-in patches registered at startup.
//!
//! Factory patches are code, not files. Their ids are fixed so a saved
//! user library can never shadow them.

use crate::patch::document::{NodeData, Patch};

/// Build every factory patch
pub fn factory_patches() -> Vec<Patch> {
    vec![
        clean_amp(),
        crunch_amp(),
        vocal_chain(),
        mastering_chain(),
        ambient_space(),
        modulated_guitar(),
        basic_synth_voice(),
        acid_sequence(),
    ]
}

fn factory(id: &str, name: &str, category: &str, description: &str, tags: &[&str]) -> Patch {
    let mut patch = Patch::new(name)
        .with_category(category)
        .with_description(description)
        .with_tags(tags);
    patch.id = format!("factory-{id}");
    patch.author = "Patchcord".to_string();
    patch.is_factory = true;
    patch
}

/// Wire port 0 of each node to port 0 of the next
fn chain(patch: &mut Patch, nodes: &[&str]) {
    for pair in nodes.windows(2) {
        patch.connect(pair[0], 0, pair[1], 0, 1.0);
    }
}

fn clean_amp() -> Patch {
    let mut patch = factory(
        "clean-amp",
        "Clean Amp",
        "Guitar",
        "Straight gain stage between input and output",
        &["clean", "guitar", "amp"],
    );
    let input = patch.add_node(NodeData::new("AudioInput"));
    let gain = patch.add_node(NodeData::new("Gain").with_param("Gain", 6.0));
    let output = patch.add_node(NodeData::new("AudioOutput"));
    chain(&mut patch, &[&input, &gain, &output]);
    patch
}

fn crunch_amp() -> Patch {
    let mut patch = factory(
        "crunch-amp",
        "Crunch Amp",
        "Guitar",
        "Gated tube drive with a mid push",
        &["distortion", "guitar", "amp", "drive"],
    );
    let input = patch.add_node(NodeData::new("AudioInput"));
    let gate = patch.add_node(NodeData::new("Gate").with_param("Threshold", -50.0));
    let drive = patch.add_node(
        NodeData::new("Distortion")
            .with_param("Type", 1.0)
            .with_param("Drive", 0.65)
            .with_param("Output", -6.0),
    );
    let eq = patch.add_node(
        NodeData::new("ParametricEQ")
            .with_param("Low Gain", -2.0)
            .with_param("Mid Freq", 800.0)
            .with_param("Mid Gain", 3.0)
            .with_param("High Gain", -4.0),
    );
    let output = patch.add_node(NodeData::new("AudioOutput"));
    chain(&mut patch, &[&input, &gate, &drive, &eq, &output]);
    patch
}

fn vocal_chain() -> Patch {
    let mut patch = factory(
        "vocal-chain",
        "Vocal Chain",
        "Vocal",
        "Gate, corrective EQ, compression and a short room",
        &["vocal", "compression", "reverb"],
    );
    let input = patch.add_node(NodeData::new("AudioInput"));
    let gate = patch.add_node(NodeData::new("Gate").with_param("Threshold", -45.0));
    let eq = patch.add_node(
        NodeData::new("ParametricEQ")
            .with_param("Low Freq", 120.0)
            .with_param("Low Gain", -4.0)
            .with_param("Mid Freq", 3000.0)
            .with_param("Mid Gain", 2.0)
            .with_param("High Gain", 2.0),
    );
    let comp = patch.add_node(
        NodeData::new("Compressor")
            .with_param("Threshold", -18.0)
            .with_param("Ratio", 3.0)
            .with_param("Attack", 5.0)
            .with_param("Makeup", 4.0),
    );
    let reverb = patch.add_node(
        NodeData::new("Reverb")
            .with_param("Room Size", 0.35)
            .with_param("Wet", 0.15),
    );
    let output = patch.add_node(NodeData::new("AudioOutput"));
    chain(&mut patch, &[&input, &gate, &eq, &comp, &reverb, &output]);
    patch
}

fn mastering_chain() -> Patch {
    let mut patch = factory(
        "mastering-chain",
        "Mastering Chain",
        "Mastering",
        "Gentle tonal balance, glue compression and a brick-wall ceiling",
        &["mastering", "limiter", "compression"],
    );
    let input = patch.add_node(NodeData::new("AudioInput"));
    let eq = patch.add_node(
        NodeData::new("ParametricEQ")
            .with_param("Low Freq", 60.0)
            .with_param("Low Gain", 1.0)
            .with_param("High Freq", 12000.0)
            .with_param("High Gain", 1.5),
    );
    let comp = patch.add_node(
        NodeData::new("Compressor")
            .with_param("Threshold", -12.0)
            .with_param("Ratio", 2.0)
            .with_param("Attack", 30.0)
            .with_param("Release", 200.0)
            .with_param("Detection", 1.0)
            .with_param("Lookahead", 5.0),
    );
    let limiter = patch.add_node(NodeData::new("Limiter").with_param("Ceiling", -0.3));
    let output = patch.add_node(NodeData::new("AudioOutput"));
    chain(&mut patch, &[&input, &eq, &comp, &limiter, &output]);
    patch
}

fn ambient_space() -> Patch {
    let mut patch = factory(
        "ambient-space",
        "Ambient Space",
        "Ambient",
        "Wobbling long delay into a large room",
        &["ambient", "delay", "reverb", "pad"],
    );
    let input = patch.add_node(NodeData::new("AudioInput"));
    let lfo = patch.add_node(NodeData::new("LFO").with_param("Rate", 0.2));
    let delay = patch.add_node(
        NodeData::new("Delay")
            .with_param("Time", 500.0)
            .with_param("Feedback", 0.55)
            .with_param("Tone", 4000.0)
            .with_param("Wet", 0.4),
    );
    let reverb = patch.add_node(
        NodeData::new("Reverb")
            .with_param("Room Size", 0.9)
            .with_param("Damping", 0.3)
            .with_param("Wet", 0.5),
    );
    let output = patch.add_node(NodeData::new("AudioOutput"));
    chain(&mut patch, &[&input, &delay, &reverb, &output]);
    // +/- 4 ms of tape wobble on the delay time
    patch.connect(&lfo, 0, &delay, 1, 4.0);
    patch
}

fn modulated_guitar() -> Patch {
    let mut patch = factory(
        "modulated-guitar",
        "Modulated Guitar",
        "Guitar",
        "Chorus and phaser into a slapback delay",
        &["chorus", "phaser", "guitar", "modulation"],
    );
    let input = patch.add_node(NodeData::new("AudioInput"));
    let chorus = patch.add_node(NodeData::new("Chorus").with_param("Mix", 0.4));
    let phaser = patch.add_node(
        NodeData::new("Phaser")
            .with_param("Rate", 0.3)
            .with_param("Stages", 6.0)
            .with_param("Mix", 0.4),
    );
    let delay = patch.add_node(
        NodeData::new("Delay")
            .with_param("Time", 120.0)
            .with_param("Feedback", 0.15)
            .with_param("Wet", 0.3),
    );
    let output = patch.add_node(NodeData::new("AudioOutput"));
    chain(&mut patch, &[&input, &chorus, &phaser, &delay, &output]);
    patch
}

fn basic_synth_voice() -> Patch {
    let mut patch = factory(
        "basic-synth-voice",
        "Basic Synth Voice",
        "Synth",
        "Clocked saw through an enveloped ladder filter and VCA",
        &["synth", "oscillator", "filter", "envelope"],
    );
    let clock = patch.add_node(NodeData::new("Clock").with_param("Division", 1.0));
    let osc = patch.add_node(
        NodeData::new("Oscillator")
            .with_param("Waveform", 1.0)
            .with_param("Frequency", 110.0)
            .with_param("Level", 0.5),
    );
    let filter = patch.add_node(
        NodeData::new("LadderFilter")
            .with_param("Cutoff", 600.0)
            .with_param("Resonance", 0.4),
    );
    let env = patch.add_node(
        NodeData::new("Envelope")
            .with_param("Attack", 5.0)
            .with_param("Decay", 200.0)
            .with_param("Sustain", 0.5)
            .with_param("Release", 300.0),
    );
    let vca = patch.add_node(NodeData::new("VCA"));
    let output = patch.add_node(NodeData::new("AudioOutput"));

    patch.connect(&clock, 0, &env, 0, 1.0);
    // Envelope opens the filter by up to two octaves and shapes the level
    patch.connect(&env, 0, &filter, 1, 2.0);
    patch.connect(&env, 0, &vca, 1, 1.0);
    chain(&mut patch, &[&osc, &filter, &vca, &output]);
    patch
}

fn acid_sequence() -> Patch {
    let mut patch = factory(
        "acid-sequence",
        "Acid Sequence",
        "Synth",
        "Sixteenth-note sequence through a resonant, driven ladder",
        &["synth", "sequencer", "acid", "bass"],
    );
    let clock = patch.add_node(
        NodeData::new("Clock")
            .with_param("Tempo", 128.0)
            .with_param("Division", 4.0)
            .with_param("Swing", 0.1),
    );
    let notes = [0.0, 0.0, 1.0, 0.25, 0.0, 0.5833, 0.0, 0.25];
    let mut seq = NodeData::new("StepSequencer").with_param("Steps", notes.len() as f32);
    for (i, volts) in notes.iter().enumerate() {
        seq = seq.with_param(format!("Step {}", i + 1), *volts);
    }
    let seq = patch.add_node(seq);
    let quant = patch.add_node(NodeData::new("Quantizer").with_param("Scale", 2.0));
    let osc = patch.add_node(
        NodeData::new("Oscillator")
            .with_param("Waveform", 1.0)
            .with_param("Frequency", 55.0)
            .with_param("Level", 0.6),
    );
    let env = patch.add_node(
        NodeData::new("Envelope")
            .with_param("Attack", 1.0)
            .with_param("Decay", 120.0)
            .with_param("Sustain", 0.0)
            .with_param("Release", 40.0),
    );
    let filter = patch.add_node(
        NodeData::new("LadderFilter")
            .with_param("Cutoff", 300.0)
            .with_param("Resonance", 0.8)
            .with_param("Drive", 2.0),
    );
    let vca = patch.add_node(NodeData::new("VCA"));
    let drive = patch.add_node(
        NodeData::new("Distortion")
            .with_param("Type", 2.0)
            .with_param("Drive", 0.4)
            .with_param("Mix", 0.5),
    );
    let delay = patch.add_node(
        NodeData::new("Delay")
            .with_param("Time", 351.5)
            .with_param("Feedback", 0.35)
            .with_param("Wet", 0.25),
    );
    let output = patch.add_node(NodeData::new("AudioOutput"));

    patch.connect(&clock, 0, &seq, 0, 1.0);
    patch.connect(&seq, 0, &quant, 0, 1.0);
    patch.connect(&quant, 0, &osc, 0, 1.0);
    patch.connect(&seq, 1, &env, 0, 1.0);
    patch.connect(&env, 0, &filter, 1, 3.0);
    patch.connect(&env, 0, &vca, 1, 1.0);
    chain(&mut patch, &[&osc, &filter, &vca, &drive, &delay, &output]);
    patch
}
