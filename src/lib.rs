//! Patchcord - Modular DSP Graph Engine
//!
//! Patchcord wires audio and control processing units into graphs and
//! persists those graphs as patch documents.
//!
//! # Architecture
//!
//! - [`node`]: the processing contract (`Processor`) and the `Node` wrapper
//!   owning ports and parameters
//! - [`nodes`]: the built-in node catalog
//! - [`registry`]: type name -> constructor, with palette metadata
//! - [`graph`]: nodes plus connections, evaluated in dependency order
//! - [`patch`]: patch documents, graph conversion and the `PatchManager`
//!
//! A host builds a graph (usually from a patch) and then calls
//! [`Graph::process`](graph::Graph::process) once per audio block.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod patch;
pub mod registry;

pub use config::EngineConfig;
pub use error::{PatchcordError, Result};
pub use graph::{Connection, ConnectionId, Graph};
pub use node::{Node, NodeId, Parameter, ParameterScale, Port, PortKind, Processor};
pub use patch::{Patch, PatchManager};
pub use registry::{NodeCategory, NodeDescriptor, NodeRegistry};
