//! Patch catalog
//!
//! The manager is an explicitly owned service, set up in this order:
//!
//! 1. `PatchManager::new(registry)`
//! 2. `register_factory_patches()`
//! 3. `set_directory(dir)`
//! 4. `load_directory(&options)`
//!
//! Directory loading is tolerant: every unreadable or malformed document is
//! logged, recorded in the [`LoadReport`] and skipped.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{PatchcordError, Result};
use crate::graph::Graph;
use crate::patch::convert::{create_graph_from_patch, create_patch_from_graph, ReconstructReport};
use crate::patch::document::Patch;
use crate::patch::factory::factory_patches;
use crate::registry::NodeRegistry;

/// Default patch document extension
pub const DEFAULT_EXTENSION: &str = "patch";

/// Default bound on a directory scan
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Catalog change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchEvent {
    Added { id: String, name: String },
    Removed { id: String, name: String },
    Loaded { count: usize },
}

/// Directory scan settings
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Stop scanning once this much time has passed (`None` = unbounded)
    pub timeout: Option<Duration>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_LOAD_TIMEOUT),
        }
    }
}

/// One document that could not be loaded
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a directory scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    pub failed: Vec<LoadFailure>,
    /// The scan stopped at the deadline before visiting every file
    pub timed_out: bool,
}

/// Factory and user patches, indexed by id and category
pub struct PatchManager {
    registry: NodeRegistry,
    patches: HashMap<String, Patch>,
    /// category -> patch ids
    categories: BTreeMap<String, Vec<String>>,
    directory: Option<PathBuf>,
    extension: String,
    subscribers: Vec<Sender<PatchEvent>>,
}

impl PatchManager {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            registry,
            patches: HashMap::new(),
            categories: BTreeMap::new(),
            directory: None,
            extension: DEFAULT_EXTENSION.to_string(),
            subscribers: Vec::new(),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Register the built-in patches; returns how many were added
    pub fn register_factory_patches(&mut self) -> usize {
        let mut count = 0;
        for patch in factory_patches() {
            if !self.patches.contains_key(&patch.id) {
                self.insert(patch);
                count += 1;
            }
        }
        debug!("Registered {} factory patches", count);
        count
    }

    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) {
        self.directory = Some(directory.into());
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Document extension without the dot (default `patch`)
    pub fn set_extension(&mut self, extension: impl Into<String>) {
        self.extension = extension.into().trim_start_matches('.').to_string();
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load every patch document under the configured directory (recursive)
    pub fn load_directory(&mut self, options: &LoadOptions) -> Result<LoadReport> {
        let directory = self
            .directory
            .clone()
            .ok_or(PatchcordError::NoPatchDirectory)?;
        let mut report = LoadReport::default();

        if !directory.is_dir() {
            info!("Patch directory {} does not exist yet", directory.display());
            self.publish(PatchEvent::Loaded { count: 0 });
            return Ok(report);
        }

        let deadline = options.timeout.map(|t| Instant::now() + t);
        let entries = WalkDir::new(&directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
            })
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();

        for path in entries {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(
                    "Patch directory scan timed out after {} documents",
                    report.loaded + report.failed.len()
                );
                report.timed_out = true;
                break;
            }

            match self.load_file(&path) {
                Ok(()) => report.loaded += 1,
                Err(reason) => {
                    warn!("Failed to load patch {}: {}", path.display(), reason);
                    report.failed.push(LoadFailure { path, reason });
                }
            }
        }

        info!(
            "Loaded {} patches from {} ({} failed)",
            report.loaded,
            directory.display(),
            report.failed.len()
        );
        self.publish(PatchEvent::Loaded {
            count: report.loaded,
        });
        Ok(report)
    }

    fn load_file(&mut self, path: &Path) -> std::result::Result<(), String> {
        let mut patch = Patch::load(path).map_err(|e| match e.source() {
            Some(source) => format!("{e}: {source}"),
            None => e.to_string(),
        })?;
        patch.is_factory = false;

        match self.patches.get(&patch.id) {
            Some(existing) if existing.is_factory => {
                return Err(format!(
                    "id {} collides with factory patch '{}'",
                    patch.id, existing.name
                ));
            }
            Some(existing) if existing.file_path.as_deref() != Some(path) => {
                return Err(format!(
                    "id {} is already used by '{}'",
                    patch.id, existing.name
                ));
            }
            _ => {}
        }

        self.remove_from_index(&patch.id);
        self.insert(patch);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add a patch to the catalog without writing it
    pub fn add(&mut self, patch: Patch) -> Result<String> {
        self.ensure_editable(&patch.id)?;
        let id = patch.id.clone();
        let is_new = !self.patches.contains_key(&id);
        self.remove_from_index(&id);
        let name = patch.name.clone();
        self.insert(patch);
        if is_new {
            self.publish(PatchEvent::Added {
                id: id.clone(),
                name,
            });
        }
        Ok(id)
    }

    /// Write a catalog patch to `<dir>/<category>/<name>.<ext>`
    ///
    /// When that file belongs to another patch (or to a document not in the
    /// catalog) the name gets a numeric suffix: `<name> 2.<ext>`, `<name> 3.<ext>`
    /// and so on. Updates the modification time and the recorded file path. A
    /// previous file at a different location is removed.
    pub fn save(&mut self, id: &str) -> Result<PathBuf> {
        self.ensure_editable(id)?;
        let directory = self
            .directory
            .clone()
            .ok_or(PatchcordError::NoPatchDirectory)?;
        let path = {
            let patch = self.require(id)?;
            let folder = directory.join(sanitize_file_name(&patch.category));
            self.free_path(id, &folder, &sanitize_file_name(&patch.name))
        };
        let patch = self
            .patches
            .get_mut(id)
            .ok_or_else(|| PatchcordError::PatchNotFound {
                patch_id: id.to_string(),
            })?;

        patch.touch();
        patch.write_to(&path)?;

        if let Some(previous) = patch.file_path.replace(path.clone()) {
            if previous != path && previous.exists() {
                fs::remove_file(&previous).map_err(|e| PatchcordError::FileWriteError {
                    path: previous.clone(),
                    source: e,
                })?;
            }
        }

        debug!("Saved patch '{}' to {}", patch.name, path.display());
        Ok(path)
    }

    /// Add a patch to the catalog and write it
    pub fn save_patch(&mut self, patch: Patch) -> Result<PathBuf> {
        let id = self.add(patch)?;
        self.save(&id)
    }

    /// Copy a patch (factory or user) as a new editable user patch
    pub fn duplicate(&mut self, id: &str, name: impl Into<String>) -> Result<String> {
        let copy = self.require(id)?.duplicate(name);
        self.add(copy)
    }

    /// Remove a user patch, its backing file and every index entry
    pub fn delete(&mut self, id: &str) -> Result<Patch> {
        self.ensure_editable(id)?;
        let patch = self.require(id)?;

        if let Some(path) = patch.file_path.as_deref() {
            if path.exists() {
                fs::remove_file(path).map_err(|e| PatchcordError::FileWriteError {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            }
        }

        self.remove_from_index(id);
        let patch = self
            .patches
            .remove(id)
            .ok_or_else(|| PatchcordError::PatchNotFound {
                patch_id: id.to_string(),
            })?;
        self.publish(PatchEvent::Removed {
            id: patch.id.clone(),
            name: patch.name.clone(),
        });
        Ok(patch)
    }

    /// First `<stem>[ n].<ext>` in `folder` that `id` may write
    fn free_path(&self, id: &str, folder: &Path, stem: &str) -> PathBuf {
        let own = self.patches.get(id).and_then(|p| p.file_path.as_deref());
        let mut n = 1;
        loop {
            let file = if n == 1 {
                format!("{stem}.{}", self.extension)
            } else {
                format!("{stem} {n}.{}", self.extension)
            };
            let candidate = folder.join(file);
            if own == Some(candidate.as_path()) {
                return candidate;
            }
            let claimed = self
                .patches
                .values()
                .any(|p| p.id != id && p.file_path.as_deref() == Some(candidate.as_path()));
            if !claimed && !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&Patch> {
        self.patches.get(id)
    }

    /// Case-insensitive exact name lookup
    pub fn find_by_name(&self, name: &str) -> Option<&Patch> {
        let name = name.to_lowercase();
        self.all().into_iter().find(|p| p.name.to_lowercase() == name)
    }

    /// Every patch, sorted by name
    pub fn all(&self) -> Vec<&Patch> {
        let mut patches: Vec<&Patch> = self.patches.values().collect();
        patches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        patches
    }

    /// Category names, sorted
    pub fn categories(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    /// Patches in one category, sorted by name
    pub fn in_category(&self, category: &str) -> Vec<&Patch> {
        let mut patches: Vec<&Patch> = self
            .categories
            .get(category)
            .into_iter()
            .flatten()
            .filter_map(|id| self.patches.get(id))
            .collect();
        patches.sort_by(|a, b| a.name.cmp(&b.name));
        patches
    }

    /// Case-insensitive substring search over name, description and tags
    pub fn search(&self, query: &str) -> Vec<&Patch> {
        let query = query.to_lowercase();
        self.all()
            .into_iter()
            .filter(|p| p.matches(&query))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    // ------------------------------------------------------------------
    // Graph conversion
    // ------------------------------------------------------------------

    /// Build a live graph from a catalog patch
    pub fn create_graph(&self, id: &str) -> Result<(Graph, ReconstructReport)> {
        let patch = self.require(id)?;
        Ok(create_graph_from_patch(patch, &self.registry))
    }

    /// Snapshot a live graph as a new (unsaved, uncataloged) patch
    pub fn create_patch(&self, graph: &Graph) -> Patch {
        create_patch_from_graph(graph)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Receive every future catalog event
    pub fn subscribe(&mut self) -> Receiver<PatchEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: PatchEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require(&self, id: &str) -> Result<&Patch> {
        self.patches
            .get(id)
            .ok_or_else(|| PatchcordError::PatchNotFound {
                patch_id: id.to_string(),
            })
    }

    fn ensure_editable(&self, id: &str) -> Result<()> {
        match self.patches.get(id) {
            Some(patch) if patch.is_factory => Err(PatchcordError::FactoryPatchReadOnly {
                name: patch.name.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, patch: Patch) {
        self.categories
            .entry(patch.category.clone())
            .or_default()
            .push(patch.id.clone());
        self.patches.insert(patch.id.clone(), patch);
    }

    fn remove_from_index(&mut self, id: &str) {
        let Some(category) = self.patches.get(id).map(|p| p.category.clone()) else {
            return;
        };
        if let Some(ids) = self.categories.get_mut(&category) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.categories.remove(&category);
            }
        }
    }
}

impl std::fmt::Debug for PatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchManager")
            .field("patches", &self.patches.len())
            .field("directory", &self.directory)
            .field("extension", &self.extension)
            .finish()
    }
}

/// Reduce a patch or category name to a portable file name
///
/// Letters, digits, spaces, `-` and `_` are kept; anything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ' ' || c == '.').to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}
