// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::HarvestConfig;
use crate::errors::HarvestError;
use crate::harvest::event::HarvestTrace;
use crate::harvest::wire::TracesPayload;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tracing::debug;

/// Traces retained for the current harvest window.
#[derive(Debug)]
pub struct HarvestTraces {
    regular: Option<HarvestTrace>,
    synthetics: Vec<HarvestTrace>,
    max_synthetics: usize,
}

impl HarvestTraces {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            regular: None,
            synthetics: Vec::new(),
            max_synthetics: config.max_synthetics_traces,
        }
    }

    /// Offers a finished transaction's trace. A regular trace replaces the
    /// held one unless it is shorter; synthetic traces are kept in arrival
    /// order until the cap is reached.
    pub fn witness(&mut self, trace: HarvestTrace) {
        if trace.event.is_synthetics() {
            if self.synthetics.len() < self.max_synthetics {
                self.synthetics.push(trace);
            } else {
                debug!(
                    "Dropping synthetic trace {}: limit of {} reached",
                    trace.event.final_name, self.max_synthetics
                );
            }
            return;
        }

        match &self.regular {
            Some(held) if trace.duration() < held.duration() => {}
            _ => self.regular = Some(trace),
        }
    }

    pub fn len(&self) -> usize {
        usize::from(self.regular.is_some()) + self.synthetics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns the retained traces, regular first.
    pub fn take(&mut self) -> Vec<HarvestTrace> {
        let mut traces = Vec::with_capacity(self.len());
        traces.extend(self.regular.take());
        traces.append(&mut self.synthetics);
        traces
    }

    /// Drains the window into a wire payload. Returns `None` when nothing
    /// was witnessed.
    pub fn data(
        &mut self,
        run_id: &str,
        harvest_start: SystemTime,
    ) -> Result<Option<Vec<u8>>, HarvestError> {
        encode(run_id, harvest_start, &self.take())
    }
}

impl Default for HarvestTraces {
    fn default() -> Self {
        Self::new(HarvestConfig::default())
    }
}

fn encode(
    run_id: &str,
    harvest_start: SystemTime,
    traces: &[HarvestTrace],
) -> Result<Option<Vec<u8>>, HarvestError> {
    if traces.is_empty() {
        return Ok(None);
    }
    debug!(
        "Encoding {} transaction traces for harvest started at {:?}",
        traces.len(),
        harvest_start
    );
    let payload = TracesPayload { run_id, traces };
    Ok(Some(serde_json::to_vec(&payload)?))
}

/// Process-wide trace harvest shared by every transaction.
#[derive(Debug)]
pub struct TraceHarvest {
    traces: Mutex<HarvestTraces>,
}

impl TraceHarvest {
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            traces: Mutex::new(HarvestTraces::new(config)),
        }
    }

    fn with_traces<T>(&self, f: impl FnOnce(&mut HarvestTraces) -> T) -> T {
        // A panic elsewhere while holding the lock leaves the selector in a
        // consistent state, so recover it.
        let mut traces = self.traces.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut traces)
    }

    pub fn witness(&self, trace: HarvestTrace) {
        self.with_traces(|traces| traces.witness(trace));
    }

    pub fn len(&self) -> usize {
        self.with_traces(|traces| traces.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the window and encodes it outside the lock.
    pub fn data(
        &self,
        run_id: &str,
        harvest_start: SystemTime,
    ) -> Result<Option<Vec<u8>>, HarvestError> {
        let traces = self.with_traces(HarvestTraces::take);
        encode(run_id, harvest_start, &traces)
    }
}

impl Default for TraceHarvest {
    fn default() -> Self {
        Self::new(HarvestConfig::default())
    }
}
