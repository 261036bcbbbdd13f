//! CLI Command Implementations
//!
//! Each command builds what it needs from an [`EngineConfig`] and prints a
//! plain-text report.

use std::path::Path;

use anyhow::{anyhow, Context};
use log::{info, warn};

use crate::config::EngineConfig;
use crate::engine::{read_mono, render, write_mono};
use crate::patch::{Patch, PatchManager};
use crate::registry::{NodeCategory, NodeRegistry};

/// Resolve configuration: file (or defaults), environment, then the CLI flag
pub fn resolve_config(
    path: Option<&Path>,
    patch_dir: Option<&Path>,
) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.apply_env().context("applying environment overrides")?;
    if let Some(dir) = patch_dir {
        config.patch_directory = Some(dir.to_path_buf());
    }
    Ok(config)
}

/// Build a patch manager with factory patches and the user library loaded
pub fn open_library(config: &EngineConfig) -> anyhow::Result<PatchManager> {
    let mut manager = PatchManager::new(NodeRegistry::with_defaults());
    manager.set_extension(config.patch_extension.clone());
    manager.register_factory_patches();

    if let Some(dir) = &config.patch_directory {
        manager.set_directory(dir);
        let report = manager
            .load_directory(&config.load_options())
            .with_context(|| format!("loading patches from {}", dir.display()))?;
        for failure in &report.failed {
            warn!("Skipped {}: {}", failure.path.display(), failure.reason);
        }
        if report.timed_out {
            warn!("Patch loading timed out; the library is incomplete");
        }
    }

    Ok(manager)
}

/// Find a patch by id, then by case-insensitive name
fn find_patch<'a>(manager: &'a PatchManager, key: &str) -> anyhow::Result<&'a Patch> {
    manager
        .get(key)
        .or_else(|| manager.find_by_name(key))
        .ok_or_else(|| anyhow!("no patch named or identified by '{key}'"))
}

/// List registered node types grouped by category.
pub fn list_nodes() -> anyhow::Result<()> {
    let registry = NodeRegistry::with_defaults();
    let mut categories: Vec<NodeCategory> = registry.descriptors().map(|d| d.category).collect();
    categories.sort();
    categories.dedup();

    for category in categories {
        println!("{}", category);
        for descriptor in registry.in_category(category) {
            println!(
                "  {:<16} {:<16} {}",
                descriptor.type_name, descriptor.display_name, descriptor.description
            );
        }
    }
    Ok(())
}

/// List patches, optionally filtered by a search query.
pub fn list_patches(config: &EngineConfig, search: Option<&str>) -> anyhow::Result<()> {
    let manager = open_library(config)?;
    let patches = match search {
        Some(query) => manager.search(query),
        None => manager.all(),
    };

    if patches.is_empty() {
        println!("No patches found.");
        return Ok(());
    }

    println!("{:<24} {:<12} {:<8} {}", "Name", "Category", "Source", "Tags");
    println!("{:-<72}", "");
    for patch in patches {
        println!(
            "{:<24} {:<12} {:<8} {}",
            patch.name,
            patch.category,
            if patch.is_factory { "factory" } else { "user" },
            patch.tags.join(", ")
        );
    }
    Ok(())
}

/// Print a patch document as JSON.
pub fn show_patch(config: &EngineConfig, key: &str) -> anyhow::Result<()> {
    let manager = open_library(config)?;
    let patch = find_patch(&manager, key)?;
    println!("{}", patch.to_json()?);
    Ok(())
}

/// Render a WAV file through a patch.
pub fn render_file(
    config: &EngineConfig,
    key: &str,
    input: &Path,
    output: &Path,
    block_size: Option<usize>,
) -> anyhow::Result<()> {
    let manager = open_library(config)?;
    let patch = find_patch(&manager, key)?;
    let (mut graph, report) = manager.create_graph(&patch.id)?;
    if !report.is_complete() {
        warn!(
            "Patch '{}' loaded partially: {} node(s) skipped, {} connection(s) dropped",
            patch.name,
            report.skipped_nodes.len(),
            report.dropped_connections.len()
        );
    }

    let mut audio = read_mono(input).with_context(|| format!("reading {}", input.display()))?;
    let block_size = block_size.unwrap_or(config.block_size).max(1);
    info!(
        "Rendering {} ({:.2} s at {} Hz) through '{}' in blocks of {}",
        input.display(),
        audio.duration_secs(),
        audio.sample_rate,
        patch.name,
        block_size
    );

    render(&mut graph, &mut audio.samples, audio.sample_rate as f32, block_size);
    write_mono(output, &audio).with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Rendered {} samples to {} (peak {:.3})",
        audio.samples.len(),
        output.display(),
        audio.peak()
    );
    Ok(())
}

/// Write editable copies of every factory patch under `dir`.
pub fn export_factory(config: &EngineConfig, dir: &Path) -> anyhow::Result<()> {
    let mut manager = PatchManager::new(NodeRegistry::with_defaults());
    manager.set_extension(config.patch_extension.clone());
    manager.register_factory_patches();
    manager.set_directory(dir);

    let factory: Vec<(String, String)> = manager
        .all()
        .into_iter()
        .filter(|p| p.is_factory)
        .map(|p| (p.id.clone(), p.name.clone()))
        .collect();

    for (id, name) in factory {
        let copy = manager.duplicate(&id, name.clone())?;
        let path = manager
            .save(&copy)
            .with_context(|| format!("exporting '{name}'"))?;
        println!("{}", path.display());
    }
    Ok(())
}
