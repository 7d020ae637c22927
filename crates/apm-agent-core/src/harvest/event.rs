// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::attributes::{AgentAttributeId, Attributes, DestinationSet};
use crate::trace::TxnTrace;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq)]
pub struct DistributedTraceInfo {
    pub guid: String,
    pub trace_id: String,
    pub priority: f32,
    pub sampled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticsInfo {
    pub resource_id: String,
}

/// Summary of a finished transaction.
#[derive(Debug, Clone)]
pub struct TxnEvent {
    pub final_name: String,
    pub start: SystemTime,
    pub duration: Duration,
    pub attrs: Option<Arc<Attributes>>,
    pub distributed_trace: Option<DistributedTraceInfo>,
    pub synthetics: Option<SyntheticsInfo>,
}

impl TxnEvent {
    pub fn new(final_name: impl Into<String>, start: SystemTime, duration: Duration) -> Self {
        Self {
            final_name: final_name.into(),
            start,
            duration,
            attrs: None,
            distributed_trace: None,
            synthetics: None,
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attrs: Arc<Attributes>) -> Self {
        self.attrs = Some(attrs);
        self
    }

    #[must_use]
    pub fn with_distributed_trace(mut self, info: DistributedTraceInfo) -> Self {
        self.distributed_trace = Some(info);
        self
    }

    #[must_use]
    pub fn with_synthetics(mut self, resource_id: impl Into<String>) -> Self {
        self.synthetics = Some(SyntheticsInfo {
            resource_id: resource_id.into(),
        });
        self
    }

    pub fn is_synthetics(&self) -> bool {
        self.synthetics.is_some()
    }

    /// The request URI, if it is allowed into transaction traces.
    pub(crate) fn trace_uri(&self) -> Option<&str> {
        let attrs = self.attrs.as_deref()?;
        let allowed = attrs
            .config()
            .agent_destinations(AgentAttributeId::RequestUri)
            .intersects(DestinationSet::TXN_TRACE);
        let uri = attrs.agent.string_val(AgentAttributeId::RequestUri);
        (allowed && !uri.is_empty()).then_some(uri)
    }

    pub(crate) fn synthetics_resource_id(&self) -> &str {
        self.synthetics
            .as_ref()
            .map_or("", |info| info.resource_id.as_str())
    }
}

/// A finished transaction together with its frozen trace tree.
#[derive(Debug, Clone)]
pub struct HarvestTrace {
    pub event: TxnEvent,
    pub trace: TxnTrace,
}

impl HarvestTrace {
    pub fn new(event: TxnEvent, trace: TxnTrace) -> Self {
        Self { event, trace }
    }

    pub fn duration(&self) -> Duration {
        self.event.duration
    }
}
