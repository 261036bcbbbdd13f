//! Patches: serializable graph snapshots and the catalog that manages them

mod convert;
mod document;
mod factory;
mod manager;

pub use convert::{create_graph_from_patch, create_patch_from_graph, ReconstructReport};
pub use document::{ConnectionData, NodeData, Patch, DEFAULT_CATEGORY, FORMAT_VERSION};
pub use factory::factory_patches;
pub use manager::{
    sanitize_file_name, LoadFailure, LoadOptions, LoadReport, PatchEvent, PatchManager,
    DEFAULT_EXTENSION, DEFAULT_LOAD_TIMEOUT,
};
