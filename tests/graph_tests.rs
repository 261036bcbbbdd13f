//! Graph behavior with real catalog nodes

use pretty_assertions::assert_eq;
use test_case::test_case;

use patchcord::engine::{render, sine};
use patchcord::{Graph, NodeId, NodeRegistry};

fn add(graph: &mut Graph, registry: &NodeRegistry, type_name: &str) -> NodeId {
    graph.add_node(registry.create(type_name).unwrap())
}

fn types_in_order(graph: &Graph) -> Vec<&'static str> {
    graph
        .evaluation_order()
        .into_iter()
        .map(|id| graph.node(id).unwrap().type_name())
        .collect()
}

#[test]
fn test_modulators_run_before_their_targets() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("order");
    // Inserted back to front on purpose
    let out = add(&mut graph, &registry, "AudioOutput");
    let filter = add(&mut graph, &registry, "LadderFilter");
    let osc = add(&mut graph, &registry, "Oscillator");
    let lfo = add(&mut graph, &registry, "LFO");

    graph.connect(osc, 0, filter, 0, 1.0).unwrap();
    graph.connect(lfo, 0, filter, 1, 1.0).unwrap();
    graph.connect(filter, 0, out, 0, 1.0).unwrap();

    assert_eq!(
        types_in_order(&graph),
        vec!["Oscillator", "LFO", "LadderFilter", "AudioOutput"]
    );
}

#[test_case("Oscillator", 0, "Envelope", 0 ; "audio into gate")]
#[test_case("Oscillator", 0, "ClockDivider", 0 ; "audio into divider clock")]
#[test_case("Gain", 0, "StepSequencer", 0 ; "audio into sequencer clock")]
fn test_incompatible_kinds_are_refused(source: &str, sp: usize, target: &str, tp: usize) {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("kinds");
    let a = add(&mut graph, &registry, source);
    let b = add(&mut graph, &registry, target);
    let err = graph.connect(a, sp, b, tp, 1.0).unwrap_err();
    assert_eq!(err.error_code(), "INCOMPATIBLE_PORTS");
    assert!(graph.connections().is_empty());
}

#[test]
fn test_control_may_drive_a_trigger() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("kinds");
    let lfo = add(&mut graph, &registry, "LFO");
    let clock = add(&mut graph, &registry, "Clock");
    assert!(graph.connect(lfo, 0, clock, 0, 1.0).is_ok());
}

#[test]
fn test_clock_drives_envelope_gate() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("gate");
    let clock = add(&mut graph, &registry, "Clock");
    let env = add(&mut graph, &registry, "Envelope");
    graph.connect(clock, 0, env, 0, 1.0).unwrap();

    assert_eq!(graph.connections().len(), 1);
    let mut peak = 0.0_f32;
    for _ in 0..40 {
        let mut buffer = vec![1.0_f32; 256];
        graph.process(&mut buffer, 256, 48000.0);
        // Control-only nodes leave the audio path alone
        assert!(buffer.iter().all(|&s| s == 1.0));
        peak = peak.max(graph.node(env).unwrap().output_value(0).unwrap());
    }
    assert!(peak > 0.5, "envelope never opened");
}

#[test]
fn test_envelope_as_cutoff_modulator_keeps_audio_level() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("filter sweep");
    let input = add(&mut graph, &registry, "AudioInput");
    let filter = add(&mut graph, &registry, "LadderFilter");
    let env = add(&mut graph, &registry, "Envelope");
    let out = add(&mut graph, &registry, "AudioOutput");
    graph.connect(input, 0, filter, 0, 1.0).unwrap();
    graph.connect(env, 0, filter, 1, 1.0).unwrap();
    graph.connect(filter, 0, out, 0, 1.0).unwrap();

    // Idle envelope, 200 Hz well under the default cutoff
    let mut audio = sine(200.0, 0.1, 48000).samples;
    render(&mut graph, &mut audio, 48000.0, 256);
    let peak = audio[2400..].iter().fold(0.0_f32, |p, s| p.max(s.abs()));
    assert!(peak > 0.4, "audio path silenced, peak {peak}");
}

#[test]
fn test_vca_follows_the_envelope() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("voice");
    let input = add(&mut graph, &registry, "AudioInput");
    let env = add(&mut graph, &registry, "Envelope");
    let vca = add(&mut graph, &registry, "VCA");
    graph.connect(input, 0, vca, 0, 1.0).unwrap();
    graph.connect(env, 0, vca, 1, 1.0).unwrap();
    graph.set_parameter(env, "Sustain", 1.0).unwrap();

    let mut closed = vec![1.0_f32; 64];
    graph.process(&mut closed, 64, 48000.0);
    assert!(closed.iter().all(|&s| s == 0.0));

    // Past the 10 ms attack into a full sustain
    graph.set_input(env, 0, 1.0).unwrap();
    for _ in 0..20 {
        let mut buffer = vec![1.0_f32; 64];
        graph.process(&mut buffer, 64, 48000.0);
    }
    let mut open = vec![1.0_f32; 64];
    graph.process(&mut open, 64, 48000.0);
    assert!(open.iter().all(|&s| (s - 1.0).abs() < 1e-6));
}

#[test]
fn test_removing_a_node_keeps_the_rest_running() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("remove");
    let input = add(&mut graph, &registry, "AudioInput");
    let gain = add(&mut graph, &registry, "Gain");
    let out = add(&mut graph, &registry, "AudioOutput");
    graph.connect(input, 0, gain, 0, 1.0).unwrap();
    graph.connect(gain, 0, out, 0, 1.0).unwrap();
    graph.set_parameter(gain, "Gain", -96.0).unwrap();

    let removed = graph.remove_node(gain).unwrap();
    assert_eq!(removed.type_name(), "Gain");
    assert!(graph.connections().is_empty());
    assert_eq!(graph.evaluation_order(), vec![input, out]);

    let mut buffer = vec![0.25_f32; 64];
    graph.process(&mut buffer, 64, 48000.0);
    assert!(buffer.iter().all(|&s| s == 0.25));
}

#[test]
fn test_feedback_loop_still_processes() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("loop");
    let a = add(&mut graph, &registry, "Delay");
    let b = add(&mut graph, &registry, "Gain");
    graph.connect(a, 0, b, 0, 1.0).unwrap();
    graph.connect(b, 0, a, 1, 1.0).unwrap();

    assert_eq!(graph.evaluation_order().len(), 2);
    let mut buffer = vec![0.1_f32; 4800];
    render(&mut graph, &mut buffer, 48000.0, 480);
    assert!(buffer.iter().all(|s| s.is_finite()));
}

#[test]
fn test_disabled_node_is_bypassed() {
    let registry = NodeRegistry::with_defaults();
    let mut graph = Graph::new("bypass");
    let gain = add(&mut graph, &registry, "Gain");
    graph.set_parameter(gain, "Gain", -20.0).unwrap();
    graph.node_mut(gain).unwrap().set_enabled(false);

    let mut buffer = vec![0.5_f32; 32];
    graph.process(&mut buffer, 32, 48000.0);
    assert!(buffer.iter().all(|&s| s == 0.5));
}
