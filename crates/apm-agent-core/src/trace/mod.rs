// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Segment recording and transaction trace construction.
//!
//! A [`SegmentTracer`] is owned by the single execution flow running a
//! transaction. Segments are started and ended in stack order; parent/child
//! structure is never passed in explicitly but follows from that order. Ended
//! segments that pass the inclusion threshold become candidate trace nodes,
//! of which only the `max_nodes` with the greatest exclusive duration are
//! kept. [`SegmentTracer::finish`] freezes the result into a [`TxnTrace`].

mod builder;
mod node_heap;
mod params;
mod tracer;
mod tree;
mod url;

pub use params::{DatastoreSegment, StackTrace, TraceNodeParams};
pub use tracer::{SegmentEnd, SegmentStartTime, SegmentTracer};
pub use tree::{TraceNode, TraceNodesJson, TxnTrace};
pub use url::{safe_url, safe_url_from_str};
