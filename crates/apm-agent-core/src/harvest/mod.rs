// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-window selection of transaction traces and their wire encoding.
//!
//! Every finished transaction is offered to the harvest. One regular trace,
//! the longest, is kept per window, alongside a bounded number of synthetic
//! traces. Draining the harvest encodes what was kept and starts a new
//! window.

mod event;
mod service;
mod traces;
mod wire;

pub use event::{DistributedTraceInfo, HarvestTrace, SyntheticsInfo, TxnEvent};
pub use service::{DataResponse, HarvestCommand, HarvestHandle, HarvestService};
pub use traces::{HarvestTraces, TraceHarvest};
pub use wire::TracesPayload;
