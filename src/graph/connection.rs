//! Directed edges between node ports.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::node::NodeId;

/// Stable connection identifier, independent of its endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(ConnectionId)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `(source, source_port) -> (target, target_port)`, scaled by `amount`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub source_port: usize,
    pub target: NodeId,
    pub target_port: usize,
    pub amount: f32,
}

impl Connection {
    /// Whether both connections join the same pair of ports
    pub fn same_endpoints(&self, other: &Connection) -> bool {
        self.source == other.source
            && self.source_port == other.source_port
            && self.target == other.target
            && self.target_port == other.target_port
    }

    /// Whether either end sits on `node`
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }
}
