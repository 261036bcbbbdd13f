//! Patch document schema
//!
//! A patch is a pure-data snapshot of a graph: string ids instead of live
//! references, parameter values by name, and document metadata. One patch
//! is stored per file as pretty-printed JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PatchcordError, Result};

/// Current document format version
pub const FORMAT_VERSION: u32 = 1;

/// Category assigned when none is given
pub const DEFAULT_CATEGORY: &str = "User";

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_amount() -> f32 {
    1.0
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A serializable graph snapshot plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Format version for migration support
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Built-in patches are registered in code and never written back
    #[serde(default)]
    pub is_factory: bool,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,

    #[serde(default)]
    pub nodes: Vec<NodeData>,

    #[serde(default)]
    pub connections: Vec<ConnectionData>,

    /// File this patch was loaded from or saved to (not serialized)
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
}

/// One node of a patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    pub type_name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Parameter values by name
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
}

impl NodeData {
    /// A node of `type_name` with a fresh id and no parameter overrides
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            id: new_id(),
            display_name: type_name.clone(),
            type_name,
            enabled: true,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

/// One connection of a patch, endpoints by node id and port index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionData {
    pub id: String,
    pub source_node: String,
    pub source_port: usize,
    pub target_node: String,
    pub target_port: usize,

    #[serde(default = "default_amount")]
    pub amount: f32,
}

impl Patch {
    /// Create an empty user patch
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            format_version: FORMAT_VERSION,
            id: new_id(),
            name: name.into(),
            description: String::new(),
            author: String::new(),
            category: default_category(),
            tags: Vec::new(),
            is_factory: false,
            created_at: now,
            modified_at: now,
            nodes: Vec::new(),
            connections: Vec::new(),
            file_path: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Update the modification timestamp
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Append a node; returns its id for wiring
    pub fn add_node(&mut self, node: NodeData) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Append a connection between two nodes of this patch
    pub fn connect(
        &mut self,
        source_node: &str,
        source_port: usize,
        target_node: &str,
        target_port: usize,
        amount: f32,
    ) -> String {
        let id = new_id();
        self.connections.push(ConnectionData {
            id: id.clone(),
            source_node: source_node.to_string(),
            source_port,
            target_node: target_node.to_string(),
            target_port,
            amount,
        });
        id
    }

    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Case-insensitive substring match over name, description and tags
    ///
    /// `query` must already be lowercase.
    pub fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.description.to_lowercase().contains(query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(query))
    }

    /// Copy with a fresh id and the factory flag cleared
    pub fn duplicate(&self, name: impl Into<String>) -> Patch {
        let now = Utc::now();
        Patch {
            id: new_id(),
            name: name.into(),
            is_factory: false,
            created_at: now,
            modified_at: now,
            file_path: None,
            ..self.clone()
        }
    }

    /// Parse a document
    ///
    /// Unknown fields are ignored. Documents from a newer format are
    /// rejected rather than half-read.
    pub fn from_json(content: &str, path: &Path) -> Result<Self> {
        let patch: Patch =
            serde_json::from_str(content).map_err(|e| PatchcordError::InvalidPatch {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if patch.format_version > FORMAT_VERSION {
            return Err(PatchcordError::InvalidPatch {
                path: path.to_path_buf(),
                reason: format!(
                    "format version {} is newer than supported version {}",
                    patch.format_version, FORMAT_VERSION
                ),
            });
        }
        if patch.id.trim().is_empty() || patch.name.trim().is_empty() {
            return Err(PatchcordError::InvalidPatch {
                path: path.to_path_buf(),
                reason: "patch id and name must not be empty".to_string(),
            });
        }

        Ok(patch)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PatchcordError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut patch = Self::from_json(&content, path)?;
        patch.format_version = FORMAT_VERSION;
        patch.file_path = Some(path.to_path_buf());
        Ok(patch)
    }

    /// Write the document to `path`, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PatchcordError::FileWriteError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let content = self.to_json()?;
        fs::write(path, content).map_err(|e| PatchcordError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
