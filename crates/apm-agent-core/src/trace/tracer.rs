// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::TxnTraceConfig;
use crate::constants::CUSTOM_SEGMENT_PREFIX;
use crate::errors::SegmentError;
use crate::trace::builder::TxnTraceBuilder;
use crate::trace::params::{DatastoreSegment, StackTrace, TraceNodeParams};
use crate::trace::tree::TxnTrace;
use crate::trace::url::{external_host, safe_url};
use std::time::{Duration, SystemTime};
use tracing::debug;
use url::Url;

/// Opaque handle returned when a segment starts. The default value is a
/// handle that was never issued and is always rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStartTime {
    stamp: u64,
    depth: usize,
}

/// Timing of an ended segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEnd {
    pub start: SystemTime,
    pub stop: SystemTime,
    pub duration: Duration,
    /// `duration` minus the time spent in direct children.
    pub exclusive: Duration,
}

#[derive(Debug)]
struct Frame {
    start: SystemTime,
    stamp: u64,
    children_time: Duration,
}

/// Records the segments of one transaction.
#[derive(Debug)]
pub struct SegmentTracer {
    txn_start: SystemTime,
    stamp: u64,
    stack: Vec<Frame>,
    top_level_time: Duration,
    builder: TxnTraceBuilder,
}

impl SegmentTracer {
    pub fn new(txn_start: SystemTime, config: TxnTraceConfig) -> Self {
        Self {
            txn_start,
            stamp: 0,
            stack: Vec::new(),
            top_level_time: Duration::ZERO,
            builder: TxnTraceBuilder::new(config),
        }
    }

    pub fn txn_start(&self) -> SystemTime {
        self.txn_start
    }

    /// Number of segments started but not yet ended.
    pub fn open_segments(&self) -> usize {
        self.stack.len()
    }

    /// Time spent in segments with no open parent. The transaction's own
    /// exclusive time is its duration minus this.
    pub fn top_level_time(&self) -> Duration {
        self.top_level_time
    }

    pub fn start_segment(&mut self, now: SystemTime) -> SegmentStartTime {
        self.stamp += 1;
        self.stack.push(Frame {
            start: now,
            stamp: self.stamp,
            children_time: Duration::ZERO,
        });
        SegmentStartTime {
            stamp: self.stamp,
            depth: self.stack.len() - 1,
        }
    }

    /// Pops the frame `start` refers to along with any frames opened above
    /// it that were never ended.
    fn end_segment(
        &mut self,
        start: SegmentStartTime,
        now: SystemTime,
    ) -> Result<(u64, SegmentEnd), SegmentError> {
        if start.stamp == 0 || start.stamp > self.stamp {
            return Err(SegmentError::Malformed);
        }
        match self.stack.get(start.depth) {
            Some(frame) if frame.stamp == start.stamp => {}
            _ => return Err(SegmentError::OutOfOrder),
        }

        let popped = self.stack.split_off(start.depth);
        if popped.len() > 1 {
            debug!(
                "Ending segment implicitly ends {} inner segments",
                popped.len() - 1
            );
        }
        let Some(frame) = popped.first() else {
            return Err(SegmentError::OutOfOrder);
        };
        let children_time: Duration = popped.iter().map(|f| f.children_time).sum();

        let duration = now.duration_since(frame.start).unwrap_or_default();
        let end = SegmentEnd {
            start: frame.start,
            stop: frame.start + duration,
            duration,
            exclusive: duration.saturating_sub(children_time),
        };

        match self.stack.last_mut() {
            Some(parent) => parent.children_time += duration,
            None => self.top_level_time += duration,
        }
        Ok((frame.stamp, end))
    }

    /// Offers the ended segment to the trace, below the segments still open.
    fn record<F>(&mut self, stamp: u64, end: SegmentEnd, describe: F)
    where
        F: FnOnce(bool) -> (String, Option<TraceNodeParams>),
    {
        let stack = &self.stack;
        let ancestors = || stack.iter().map(|frame| frame.stamp).collect::<Vec<_>>();
        self.builder.record(stamp, end, ancestors, describe);
    }

    /// Ends a segment named `Custom/{name}`.
    pub fn end_basic_segment(
        &mut self,
        start: SegmentStartTime,
        now: SystemTime,
        name: &str,
    ) -> Result<SegmentEnd, SegmentError> {
        let (stamp, end) = self.end_segment(start, now)?;
        self.record(stamp, end, |capture| {
            let params = capture.then(|| TraceNodeParams {
                stack_trace: Some(StackTrace::capture()),
                ..Default::default()
            });
            (format!("{CUSTOM_SEGMENT_PREFIX}{name}"), params)
        });
        Ok(end)
    }

    pub fn end_datastore_segment(
        &mut self,
        start: SegmentStartTime,
        now: SystemTime,
        segment: DatastoreSegment,
    ) -> Result<SegmentEnd, SegmentError> {
        let (stamp, end) = self.end_segment(start, now)?;
        self.record(stamp, end, |capture| {
            let name = segment.node_name();
            (name, Some(segment.into_params(capture.then(StackTrace::capture))))
        });
        Ok(end)
    }

    /// Ends a segment named `External/{host}/all`. The URL is recorded
    /// without credentials, query or fragment.
    pub fn end_external_segment(
        &mut self,
        start: SegmentStartTime,
        now: SystemTime,
        url: Option<&Url>,
    ) -> Result<SegmentEnd, SegmentError> {
        let (stamp, end) = self.end_segment(start, now)?;
        self.record(stamp, end, |capture| {
            let name = format!("External/{}/all", external_host(url));
            let clean_url = url.map(safe_url).unwrap_or_default();
            let params = (capture || !clean_url.is_empty()).then(|| TraceNodeParams {
                stack_trace: capture.then(StackTrace::capture),
                clean_url,
                ..Default::default()
            });
            (name, params)
        });
        Ok(end)
    }

    /// Freezes the trace tree. Nodes below segments left open hang from
    /// their nearest ended ancestor, or the top level.
    pub fn finish(self) -> TxnTrace {
        if !self.stack.is_empty() {
            debug!(
                "Finishing transaction trace with {} open segments",
                self.stack.len()
            );
        }
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn at(ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(ms)
    }

    fn tracer(config: TxnTraceConfig) -> SegmentTracer {
        SegmentTracer::new(at(0), config)
    }

    fn no_threshold() -> TxnTraceConfig {
        TxnTraceConfig {
            segment_threshold: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_exclusive_duration() {
        let mut tracer = tracer(no_threshold());
        let outer = tracer.start_segment(at(0));
        let inner = tracer.start_segment(at(10));
        let inner_end = tracer.end_basic_segment(inner, at(40), "inner").unwrap();
        let outer_end = tracer.end_basic_segment(outer, at(100), "outer").unwrap();

        assert_eq!(inner_end.exclusive, Duration::from_millis(30));
        assert_eq!(outer_end.duration, Duration::from_millis(100));
        assert_eq!(outer_end.exclusive, Duration::from_millis(70));
        assert_eq!(tracer.top_level_time(), Duration::from_millis(100));

        let tree = tracer.finish();
        let outer = tree.roots().next().unwrap();
        assert_eq!(outer.name, "Custom/outer");
        let inner: Vec<_> = tree.children(outer).map(|n| n.name.as_str()).collect();
        assert_eq!(inner, vec!["Custom/inner"]);
    }

    #[test]
    fn test_invalid_handles() {
        let mut tracer = tracer(no_threshold());
        assert_eq!(
            tracer.end_basic_segment(SegmentStartTime::default(), at(1), "x"),
            Err(SegmentError::Malformed)
        );

        let first = tracer.start_segment(at(0));
        tracer.end_basic_segment(first, at(1), "first").unwrap();
        assert_eq!(
            tracer.end_basic_segment(first, at(2), "first"),
            Err(SegmentError::OutOfOrder)
        );

        let bogus = SegmentStartTime { stamp: 99, depth: 0 };
        assert_eq!(
            tracer.end_basic_segment(bogus, at(2), "bogus"),
            Err(SegmentError::Malformed)
        );
    }

    #[test]
    #[traced_test]
    fn test_ending_outer_ends_inner() {
        let mut tracer = tracer(no_threshold());
        let outer = tracer.start_segment(at(0));
        let inner = tracer.start_segment(at(1));
        let innermost = tracer.start_segment(at(2));
        tracer.end_basic_segment(innermost, at(3), "innermost").unwrap();

        let end = tracer.end_basic_segment(outer, at(10), "outer").unwrap();
        assert!(logs_contain("implicitly ends 1 inner segments"));
        assert_eq!(end.exclusive, Duration::from_millis(9));
        assert_eq!(tracer.open_segments(), 0);
        assert_eq!(
            tracer.end_basic_segment(inner, at(11), "inner"),
            Err(SegmentError::OutOfOrder)
        );

        let tree = tracer.finish();
        let outer = tree.roots().next().unwrap();
        let names: Vec<_> = tree.children(outer).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Custom/innermost"]);
    }

    #[test]
    fn test_below_threshold_children_promoted() {
        let config = TxnTraceConfig {
            segment_threshold: Duration::from_millis(5),
            ..Default::default()
        };
        let mut tracer = tracer(config);
        let parent = tracer.start_segment(at(0));
        let child = tracer.start_segment(at(0));
        tracer.end_basic_segment(child, at(10), "child").unwrap();
        // Parent's own duration passes, so it is kept with the child below it.
        tracer.end_basic_segment(parent, at(11), "parent").unwrap();

        let short = tracer.start_segment(at(20));
        let grandchild = tracer.start_segment(at(20));
        tracer.end_basic_segment(grandchild, at(26), "kept").unwrap();
        tracer.end_basic_segment(short, at(24), "short").unwrap();

        let tree = tracer.finish();
        let roots: Vec<_> = tree.roots().map(|n| n.name.as_str()).collect();
        assert_eq!(roots, vec!["Custom/parent", "Custom/kept"]);
    }

    #[test]
    fn test_open_segments_at_finish() {
        let mut tracer = tracer(no_threshold());
        let _open = tracer.start_segment(at(0));
        let child = tracer.start_segment(at(1));
        tracer.end_basic_segment(child, at(2), "child").unwrap();

        let tree = tracer.finish();
        let roots: Vec<_> = tree.roots().map(|n| n.name.as_str()).collect();
        assert_eq!(roots, vec!["Custom/child"]);
    }

    #[test]
    fn test_stack_traces_above_threshold() {
        let config = TxnTraceConfig {
            segment_threshold: Duration::ZERO,
            stack_trace_threshold: Duration::from_millis(500),
            ..Default::default()
        };
        let mut tracer = tracer(config);
        let url = Url::parse("http://example.com/zip/zap?secret=shhh").unwrap();

        let s = tracer.start_segment(at(0));
        tracer.end_basic_segment(s, at(100), "fast").unwrap();
        let s = tracer.start_segment(at(100));
        tracer.end_basic_segment(s, at(700), "slow").unwrap();
        let s = tracer.start_segment(at(700));
        tracer.end_external_segment(s, at(800), Some(&url)).unwrap();
        let s = tracer.start_segment(at(800));
        tracer.end_external_segment(s, at(1400), Some(&url)).unwrap();
        let s = tracer.start_segment(at(1400));
        tracer
            .end_datastore_segment(s, at(2000), DatastoreSegment::default())
            .unwrap();

        let tree = tracer.finish();
        let nodes: Vec<_> = tree.roots().collect();
        assert!(nodes[0].params.is_none());
        assert!(nodes[1].params.as_ref().unwrap().stack_trace.is_some());
        let params = nodes[2].params.as_ref().unwrap();
        assert!(params.stack_trace.is_none());
        assert_eq!(params.clean_url, "http://example.com/zip/zap");
        assert!(nodes[3].params.as_ref().unwrap().stack_trace.is_some());
        assert!(nodes[4].params.as_ref().unwrap().stack_trace.is_some());
    }

    #[test]
    fn test_clock_skew_saturates() {
        let mut tracer = tracer(no_threshold());
        let s = tracer.start_segment(at(10));
        let end = tracer.end_basic_segment(s, at(5), "skewed").unwrap();
        assert_eq!(end.duration, Duration::ZERO);
        assert_eq!(end.exclusive, Duration::ZERO);
    }

    fn distinct_durations_and_permutation() -> impl Strategy<Value = (Vec<u64>, Vec<u64>)> {
        proptest::collection::hash_set(1u64..1000, 1..40)
            .prop_map(|set| set.into_iter().collect::<Vec<_>>())
            .prop_flat_map(|durations| (Just(durations.clone()), Just(durations).prop_shuffle()))
    }

    fn kept_durations(config: TxnTraceConfig, durations: &[u64]) -> Vec<u64> {
        let mut tracer = tracer(config);
        let mut now = 0;
        for ms in durations {
            let s = tracer.start_segment(at(now));
            now += ms;
            tracer.end_basic_segment(s, at(now), &ms.to_string()).unwrap();
        }
        let mut kept: Vec<u64> = tracer
            .finish()
            .roots()
            .map(|n| n.name.trim_start_matches(CUSTOM_SEGMENT_PREFIX).parse().unwrap())
            .collect();
        kept.sort_unstable();
        kept
    }

    proptest! {
        // The kept set is exactly the `cap` longest segments, whatever order
        // they arrive in.
        #[test]
        fn kept_nodes_are_longest_in_any_order(
            (durations, shuffled) in distinct_durations_and_permutation(),
            cap in 1usize..10,
        ) {
            let config = TxnTraceConfig {
                segment_threshold: Duration::ZERO,
                max_nodes: cap,
                ..Default::default()
            };

            let mut expected = durations.clone();
            expected.sort_unstable_by(|a, b| b.cmp(a));
            expected.truncate(cap);
            expected.sort_unstable();

            prop_assert_eq!(kept_durations(config, &durations), expected.clone());
            prop_assert_eq!(kept_durations(config, &shuffled), expected);
        }
    }
}
