//! Action sources and grid node identity.
//!
//! Every insert, extract and announcement carries the source that caused it,
//! so listeners can tell their own changes apart from everyone else's.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a node attached to the grid (a storage bus, a terminal, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who initiated an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionSource {
    /// No particular origin.
    Anonymous,
    /// A machine attached to the grid.
    Machine { node: NodeId },
    /// A player acting through some interface.
    Player { name: String },
}

impl ActionSource {
    #[must_use]
    pub const fn machine(node: NodeId) -> Self {
        Self::Machine { node }
    }

    /// The machine node, if this source is a machine.
    #[must_use]
    pub const fn machine_node(&self) -> Option<NodeId> {
        match self {
            Self::Machine { node } => Some(*node),
            _ => None,
        }
    }
}

impl Default for ActionSource {
    fn default() -> Self {
        Self::Anonymous
    }
}
