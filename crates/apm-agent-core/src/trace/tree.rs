// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::trace::params::TraceNodeParams;
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use serde::ser::{Serialize, SerializeSeq, SerializeTuple, Serializer};
use std::time::{Duration, SystemTime};

/// A retained segment.
#[derive(Debug, Clone)]
pub struct TraceNode {
    pub start: SystemTime,
    pub stop: SystemTime,
    pub duration: Duration,
    pub exclusive: Duration,
    pub name: String,
    pub params: Option<TraceNodeParams>,
    pub(crate) children: Vec<usize>,
}

/// Frozen trace tree of one transaction. Siblings are in start order.
#[derive(Debug, Clone, Default)]
pub struct TxnTrace {
    nodes: Vec<TraceNode>,
    roots: Vec<usize>,
}

impl TxnTrace {
    pub(crate) fn new(nodes: Vec<TraceNode>, roots: Vec<usize>) -> Self {
        Self { nodes, roots }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = &TraceNode> + '_ {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    pub fn children<'a>(&'a self, node: &'a TraceNode) -> impl Iterator<Item = &'a TraceNode> + 'a {
        node.children.iter().map(|&i| &self.nodes[i])
    }

    /// Depth-first walk in start order.
    pub fn iter(&self) -> impl Iterator<Item = &TraceNode> + '_ {
        let mut pending: Vec<usize> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let index = pending.pop()?;
            let node = &self.nodes[index];
            pending.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Count of retained nodes per name.
    pub fn node_names(&self) -> HashMap<&str, usize, FnvBuildHasher> {
        let mut counts = HashMap::default();
        for node in &self.nodes {
            *counts.entry(node.name.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Wire rendering of the top level nodes, with offsets in milliseconds
    /// from `txn_start`.
    pub fn roots_json(&self, txn_start: SystemTime) -> TraceNodesJson<'_> {
        TraceNodesJson {
            trace: self,
            indices: &self.roots,
            txn_start,
        }
    }
}

fn offset_millis(at: SystemTime, txn_start: SystemTime) -> u64 {
    let offset = at.duration_since(txn_start).unwrap_or_default();
    u64::try_from(offset.as_millis()).unwrap_or(u64::MAX)
}

pub struct TraceNodesJson<'a> {
    trace: &'a TxnTrace,
    indices: &'a [usize],
    txn_start: SystemTime,
}

impl Serialize for TraceNodesJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.indices.len()))?;
        for &index in self.indices {
            seq.serialize_element(&TraceNodeJson {
                trace: self.trace,
                node: &self.trace.nodes[index],
                txn_start: self.txn_start,
            })?;
        }
        seq.end()
    }
}

/// `[start_ms, stop_ms, name, params, children]`
struct TraceNodeJson<'a> {
    trace: &'a TxnTrace,
    node: &'a TraceNode,
    txn_start: SystemTime,
}

impl Serialize for TraceNodeJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.node;
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&offset_millis(node.start, self.txn_start))?;
        tuple.serialize_element(&offset_millis(node.stop, self.txn_start))?;
        tuple.serialize_element(&node.name)?;
        match &node.params {
            Some(params) => tuple.serialize_element(params)?,
            None => tuple.serialize_element(&TraceNodeParams::default())?,
        }
        tuple.serialize_element(&TraceNodesJson {
            trace: self.trace,
            indices: &node.children,
            txn_start: self.txn_start,
        })?;
        tuple.end()
    }
}
