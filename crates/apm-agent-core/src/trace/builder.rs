// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::TxnTraceConfig;
use crate::trace::node_heap::{NodeHeap, NodeRank, Offer};
use crate::trace::params::TraceNodeParams;
use crate::trace::tracer::SegmentEnd;
use crate::trace::tree::{TraceNode, TxnTrace};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use tracing::trace;

/// A candidate node. `ancestors` holds the stamps of the segments that were
/// open when it ended, outermost first; the tree is rebuilt from them, so
/// an evicted node leaves nothing behind.
#[derive(Debug)]
struct PendingNode {
    stamp: u64,
    ancestors: Vec<u64>,
    end: SegmentEnd,
    name: String,
    params: Option<TraceNodeParams>,
}

/// Collects candidate nodes while a transaction runs. Never holds more than
/// `max_nodes` of them.
#[derive(Debug)]
pub(crate) struct TxnTraceBuilder {
    config: TxnTraceConfig,
    heap: NodeHeap<PendingNode>,
    seq: u64,
}

impl TxnTraceBuilder {
    pub fn new(config: TxnTraceConfig) -> Self {
        Self {
            config,
            heap: NodeHeap::new(config.max_nodes),
            seq: 0,
        }
    }

    /// Number of candidate nodes currently held.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    fn considers(&self, end: &SegmentEnd) -> bool {
        self.config.enabled
            && end.duration >= self.config.segment_threshold
            && self.heap.would_accept(end.exclusive)
    }

    /// Offers the ended segment `stamp` as a trace node. `ancestors` and
    /// `describe` are only called when the node will be kept; the argument
    /// of `describe` says whether a stack trace should be captured.
    pub fn record<A, F>(&mut self, stamp: u64, end: SegmentEnd, ancestors: A, describe: F) -> bool
    where
        A: FnOnce() -> Vec<u64>,
        F: FnOnce(bool) -> (String, Option<TraceNodeParams>),
    {
        if !self.considers(&end) {
            return false;
        }

        let (name, params) = describe(end.duration >= self.config.stack_trace_threshold);
        let rank = NodeRank {
            exclusive: end.exclusive,
            seq: self.seq,
        };
        self.seq += 1;

        let node = PendingNode {
            stamp,
            ancestors: ancestors(),
            end,
            name,
            params,
        };
        match self.heap.offer(rank, node) {
            Offer::Accepted => true,
            Offer::Replaced(evicted) => {
                trace!("Evicted trace node {} to stay within node limit", evicted.name);
                true
            }
            Offer::Rejected => false,
        }
    }

    /// Freezes the retained nodes into a trace tree. Each node hangs under
    /// its nearest retained ancestor, siblings in start order.
    pub fn build(self) -> TxnTrace {
        let mut pending = self.heap.into_items();
        pending.sort_unstable_by_key(|node| node.stamp);

        let mut index: HashMap<u64, usize, FnvBuildHasher> =
            HashMap::with_capacity_and_hasher(pending.len(), FnvBuildHasher::default());
        let mut nodes: Vec<TraceNode> = Vec::with_capacity(pending.len());
        let mut roots = Vec::new();

        for node in pending {
            let position = nodes.len();
            let parent = node
                .ancestors
                .iter()
                .rev()
                .find_map(|stamp| index.get(stamp).copied());
            match parent {
                Some(parent) => nodes[parent].children.push(position),
                None => roots.push(position),
            }
            index.insert(node.stamp, position);
            nodes.push(TraceNode {
                start: node.end.start,
                stop: node.end.stop,
                duration: node.end.duration,
                exclusive: node.end.exclusive,
                name: node.name,
                params: node.params,
                children: Vec::new(),
            });
        }
        TxnTrace::new(nodes, roots)
    }
}
