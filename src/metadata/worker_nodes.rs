use crate::config::DuplicateNodePolicy;
use crate::core::{MetadataError, NodeId, NodeRole, Result};
use crate::storage::NodeRow;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Level, event, info_span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerNode {
    pub node_id: NodeId,
    pub name: String,
    pub port: u32,
    pub active: bool,
    pub role: NodeRole,
    pub group_id: u32,
}

impl WorkerNode {
    pub fn from_row(row: NodeRow) -> Result<Self> {
        Ok(Self {
            node_id: row.node_id,
            role: NodeRole::from_code(row.role)?,
            name: row.name,
            port: row.port,
            active: row.active,
            group_id: row.group_id,
        })
    }
}

pub type WorkerNodeMap = HashMap<NodeId, WorkerNode>;

/// Non-fatal findings of a registry build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryWarning {
    /// Two node rows shared a node id; the named row was kept.
    DuplicateNode {
        node_id: NodeId,
        name: String,
        port: u32,
    },
}

/// Result of one registry build.
#[derive(Debug, Clone, Default)]
pub struct WorkerNodeBuild {
    pub nodes: WorkerNodeMap,
    pub warnings: Vec<RegistryWarning>,
}

/// Fold node rows into a map keyed by node id, in scan order.
pub fn build_worker_node_map(
    rows: Vec<NodeRow>,
    policy: DuplicateNodePolicy,
    capacity: usize,
) -> Result<WorkerNodeBuild> {
    let mut nodes = WorkerNodeMap::with_capacity(capacity.min(rows.len().max(1)));
    let mut warnings = Vec::new();

    for row in rows {
        let node = WorkerNode::from_row(row)?;
        let node_id = node.node_id;

        if nodes.contains_key(&node_id) {
            if policy == DuplicateNodePolicy::Reject {
                return Err(MetadataError::DuplicateWorkerNode(node_id));
            }
            warn!(
                "multiple lines for worker node {}: keeping \"{}:{}\"",
                node_id, node.name, node.port
            );
            warnings.push(RegistryWarning::DuplicateNode {
                node_id,
                name: node.name.clone(),
                port: node.port,
            });
        }

        nodes.insert(node_id, node);
    }

    Ok(WorkerNodeBuild { nodes, warnings })
}

/// Lazily built node map, replaced wholesale on invalidation.
#[derive(Debug, Default)]
pub struct WorkerNodeRegistry {
    nodes: Option<Arc<WorkerNodeMap>>,
    warnings: Vec<RegistryWarning>,
}

impl WorkerNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.nodes.is_some()
    }

    /// Return the current map, building it with `scan` if there is none.
    pub fn get_or_build<F>(
        &mut self,
        policy: DuplicateNodePolicy,
        capacity: usize,
        scan: F,
    ) -> Result<Arc<WorkerNodeMap>>
    where
        F: FnOnce() -> Result<Vec<NodeRow>>,
    {
        if let Some(nodes) = &self.nodes {
            return Ok(Arc::clone(nodes));
        }

        let span = info_span!("metadata.nodes.rebuild");
        let _enter = span.enter();

        let build = build_worker_node_map(scan()?, policy, capacity)?;
        event!(
            Level::DEBUG,
            nodes = build.nodes.len(),
            duplicates = build.warnings.len(),
            "worker node map rebuilt"
        );

        let nodes = Arc::new(build.nodes);
        self.nodes = Some(Arc::clone(&nodes));
        self.warnings = build.warnings;
        Ok(nodes)
    }

    /// Warnings recorded by the most recent build.
    pub fn warnings(&self) -> &[RegistryWarning] {
        &self.warnings
    }

    /// Drop the whole map; the next access rebuilds it.
    pub fn invalidate(&mut self) {
        self.nodes = None;
        self.warnings.clear();
    }
}
