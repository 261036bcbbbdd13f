//! Patch documents, graph conversion and the patch manager on disk

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;

use patchcord::patch::{
    create_graph_from_patch, create_patch_from_graph, factory_patches, LoadOptions, NodeData,
    PatchEvent,
};
use patchcord::{Graph, NodeRegistry, Patch, PatchManager};

/// Node types, parameters and connections by node position
type Shape = (
    Vec<(String, Vec<(String, f32)>)>,
    Vec<(usize, usize, usize, usize, f32)>,
);

fn shape_of_patch(patch: &Patch) -> Shape {
    let position = |id: &str| patch.nodes.iter().position(|n| n.id == id).unwrap();
    let nodes = patch
        .nodes
        .iter()
        .map(|n| {
            (
                n.type_name.clone(),
                n.parameters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            )
        })
        .collect();
    let connections = patch
        .connections
        .iter()
        .map(|c| {
            (
                position(&c.source_node),
                c.source_port,
                position(&c.target_node),
                c.target_port,
                c.amount,
            )
        })
        .collect();
    (nodes, connections)
}

#[test]
fn test_graph_patch_graph_preserves_topology() {
    let registry = NodeRegistry::with_defaults();
    for patch in factory_patches() {
        let (graph, report) = create_graph_from_patch(&patch, &registry);
        assert!(report.is_complete(), "{}", patch.name);

        let snapshot = create_patch_from_graph(&graph);
        let (again, report) = create_graph_from_patch(&snapshot, &registry);
        assert!(report.is_complete(), "{}", patch.name);
        let second = create_patch_from_graph(&again);

        assert_eq!(shape_of_patch(&snapshot), shape_of_patch(&second));

        let (original_nodes, original_connections) = shape_of_patch(&patch);
        let (nodes, connections) = shape_of_patch(&snapshot);
        assert_eq!(connections, original_connections, "{}", patch.name);
        assert_eq!(nodes.len(), original_nodes.len());
        for ((type_name, params), (original_type, original_params)) in
            nodes.iter().zip(&original_nodes)
        {
            assert_eq!(type_name, original_type);
            // Factory documents list only the parameters they change
            for (name, value) in original_params {
                let (_, restored) = params.iter().find(|(n, _)| n == name).unwrap();
                assert!((restored - value).abs() < 1e-6, "{type_name}.{name}");
            }
        }
    }
}

#[test]
fn test_snapshot_keeps_explicit_parameters() {
    let registry = NodeRegistry::with_defaults();
    let mut patch = Patch::new("Params");
    patch.add_node(NodeData::new("Reverb").with_param("Room Size", 0.9));
    let disabled = patch.add_node(NodeData::new("Chorus").with_display_name("Wide"));
    patch.nodes[1].enabled = false;

    let (graph, _) = create_graph_from_patch(&patch, &registry);
    let snapshot = create_patch_from_graph(&graph);

    assert_eq!(snapshot.nodes[0].parameters.get("Room Size"), Some(&0.9));
    assert_eq!(snapshot.nodes[1].display_name, "Wide");
    assert!(!snapshot.nodes[1].enabled);
    assert_ne!(snapshot.nodes[1].id, disabled);
}

#[test]
fn test_saved_library_reloads_in_a_fresh_manager() {
    let dir = tempdir().unwrap();

    let mut manager = PatchManager::new(NodeRegistry::with_defaults());
    manager.register_factory_patches();
    manager.set_directory(dir.path());

    let mut graph = Graph::new("Lead");
    let registry = NodeRegistry::with_defaults();
    let osc = graph.add_node(registry.create("Oscillator").unwrap());
    let out = graph.add_node(registry.create("AudioOutput").unwrap());
    graph.connect(osc, 0, out, 0, 0.5).unwrap();

    let lead = manager.create_patch(&graph).with_category("Synth");
    let lead_id = lead.id.clone();
    let lead_path = manager.save_patch(lead).unwrap();
    let factory_id = manager.find_by_name("Crunch Amp").unwrap().id.clone();
    let crunch = manager.duplicate(&factory_id, "My Crunch").unwrap();
    manager.save(&crunch).unwrap();

    assert_eq!(lead_path, dir.path().join("Synth").join("Lead.patch"));
    assert!(dir.path().join("Guitar").join("My Crunch.patch").is_file());

    let mut fresh = PatchManager::new(NodeRegistry::with_defaults());
    fresh.register_factory_patches();
    fresh.set_directory(dir.path());
    let events = fresh.subscribe();
    let report = fresh.load_directory(&LoadOptions::default()).unwrap();

    assert_eq!(report.loaded, 2);
    assert!(report.failed.is_empty());
    assert_eq!(events.try_recv().unwrap(), PatchEvent::Loaded { count: 2 });

    let loaded = fresh.get(&lead_id).unwrap();
    assert!(!loaded.is_factory);
    assert_eq!(loaded.file_path.as_deref(), Some(lead_path.as_path()));

    let (graph, report) = fresh.create_graph(&lead_id).unwrap();
    assert!(report.is_complete());
    assert_eq!(graph.connections()[0].amount, 0.5);
    assert_eq!(
        fresh
            .in_category("Synth")
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>(),
        vec!["Acid Sequence", "Basic Synth Voice", "Lead"]
    );
}

#[test]
fn test_reload_replaces_edited_file() {
    let dir = tempdir().unwrap();
    let mut manager = PatchManager::new(NodeRegistry::with_defaults());
    manager.set_directory(dir.path());
    let path = manager
        .save_patch(Patch::new("Pad").with_description("soft"))
        .unwrap();

    let mut edited = Patch::load(&path).unwrap();
    edited.description = "brighter".to_string();
    fs::write(&path, edited.to_json().unwrap()).unwrap();

    let report = manager.load_directory(&LoadOptions::default()).unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.find_by_name("pad").unwrap().description, "brighter");
}

#[test]
fn test_same_named_patches_get_their_own_files() {
    let dir = tempdir().unwrap();
    let mut manager = PatchManager::new(NodeRegistry::with_defaults());
    manager.set_directory(dir.path());

    let first = Patch::new("Pad");
    let first_id = first.id.clone();
    let first_path = manager.save_patch(first).unwrap();
    let second_path = manager.save_patch(Patch::new("Pad")).unwrap();

    assert_ne!(first_path, second_path);
    assert_eq!(second_path.file_name().unwrap(), "Pad 2.patch");
    // Saving again keeps each patch on its own file
    assert_eq!(manager.save(&first_id).unwrap(), first_path);

    let mut fresh = PatchManager::new(NodeRegistry::with_defaults());
    fresh.set_directory(dir.path());
    let report = fresh.load_directory(&LoadOptions::default()).unwrap();
    assert_eq!(report.loaded, 2);

    manager.delete(&first_id).unwrap();
    assert!(!first_path.exists());
    assert!(second_path.is_file());
}
