//! Error handling for Patchcord
//!
//! Configuration mistakes (unknown node types, unknown parameters, bad port
//! indices) and persistence failures share one error type. DSP code never
//! returns errors: nodes clamp their own inputs instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Patchcord operations
pub type Result<T> = std::result::Result<T, PatchcordError>;

/// Main error type for Patchcord operations
#[derive(Error, Debug)]
pub enum PatchcordError {
    // Node / Registry Errors
    #[error("Unknown node type: {type_name}")]
    UnknownNodeType { type_name: String },

    #[error("Node '{node}' has no parameter named '{name}'")]
    UnknownParameter { node: String, name: String },

    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Node '{node}' has no {direction} port at index {index}")]
    PortOutOfRange {
        node: String,
        direction: &'static str,
        index: usize,
    },

    // Graph Errors
    #[error("Cannot connect {source_kind} output to {target_kind} input")]
    IncompatiblePorts {
        source_kind: &'static str,
        target_kind: &'static str,
    },

    #[error("Connection already exists between these ports")]
    DuplicateConnection,

    #[error("A node cannot be connected to itself: {node_id}")]
    SelfConnection { node_id: String },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },

    // Patch Errors
    #[error("Patch not found: {patch_id}")]
    PatchNotFound { patch_id: String },

    #[error("Factory patch '{name}' is read-only")]
    FactoryPatchReadOnly { name: String },

    #[error("No patch directory has been configured")]
    NoPatchDirectory,

    #[error("Invalid patch document {}: {reason}", path.display())]
    InvalidPatch { path: PathBuf, reason: String },

    // File Errors
    #[error("Failed to read {}", path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}", path.display())]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<hound::Error>,
    },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PatchcordError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PatchcordError::UnknownNodeType { .. } => "UNKNOWN_NODE_TYPE",
            PatchcordError::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            PatchcordError::NodeNotFound { .. } => "NODE_NOT_FOUND",
            PatchcordError::PortOutOfRange { .. } => "PORT_OUT_OF_RANGE",
            PatchcordError::IncompatiblePorts { .. } => "INCOMPATIBLE_PORTS",
            PatchcordError::DuplicateConnection => "DUPLICATE_CONNECTION",
            PatchcordError::SelfConnection { .. } => "SELF_CONNECTION",
            PatchcordError::ConnectionNotFound { .. } => "CONNECTION_NOT_FOUND",
            PatchcordError::PatchNotFound { .. } => "PATCH_NOT_FOUND",
            PatchcordError::FactoryPatchReadOnly { .. } => "FACTORY_PATCH_READ_ONLY",
            PatchcordError::NoPatchDirectory => "NO_PATCH_DIRECTORY",
            PatchcordError::InvalidPatch { .. } => "INVALID_PATCH",
            PatchcordError::FileReadError { .. } => "FILE_READ_ERROR",
            PatchcordError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            PatchcordError::InvalidAudio { .. } => "INVALID_AUDIO",
            PatchcordError::InvalidConfig { .. } => "INVALID_CONFIG",
            PatchcordError::Io(_) => "IO_ERROR",
            PatchcordError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Persistence failures affect a single document and can be skipped.
    /// Everything else points at a programming or configuration mistake.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PatchcordError::InvalidPatch { .. }
                | PatchcordError::FileReadError { .. }
                | PatchcordError::FileWriteError { .. }
                | PatchcordError::PatchNotFound { .. }
                | PatchcordError::Serialization(_)
                | PatchcordError::Io(_)
        )
    }
}
