// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::attributes::{AgentAttributesJson, DestinationSet, UserAttributesJson};
use crate::harvest::event::{HarvestTrace, TxnEvent};
use serde::ser::{Serialize, SerializeMap, SerializeTuple, Serializer};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Transaction trace payload: `[run_id, [entry, ...]]`.
pub struct TracesPayload<'a> {
    pub run_id: &'a str,
    pub traces: &'a [HarvestTrace],
}

impl Serialize for TracesPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(self.run_id)?;
        tuple.serialize_element(&Entries(self.traces))?;
        tuple.end()
    }
}

struct Entries<'a>(&'a [HarvestTrace]);

impl Serialize for Entries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(Entry))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn unix_micros(at: SystemTime) -> u64 {
    let since_epoch = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    u64::try_from(since_epoch.as_micros()).unwrap_or(u64::MAX)
}

/// `[start_us, duration_ms, name, uri, details, "", null, false, null, resource_id]`
struct Entry<'a>(&'a HarvestTrace);

impl Serialize for Entry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let event = &self.0.event;
        let mut tuple = serializer.serialize_tuple(10)?;
        tuple.serialize_element(&unix_micros(event.start))?;
        tuple.serialize_element(&millis(event.duration))?;
        tuple.serialize_element(&event.final_name)?;
        tuple.serialize_element(&event.trace_uri())?;
        tuple.serialize_element(&Details(self.0))?;
        // Legacy cross application tracing guid.
        tuple.serialize_element("")?;
        tuple.serialize_element(&())?;
        // Force persist.
        tuple.serialize_element(&false)?;
        tuple.serialize_element(&())?;
        tuple.serialize_element(event.synthetics_resource_id())?;
        tuple.end()
    }
}

/// `[0, {}, {}, root, attributes]`
struct Details<'a>(&'a HarvestTrace);

impl Serialize for Details<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let empty = EmptyObject;
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&0)?;
        tuple.serialize_element(&empty)?;
        tuple.serialize_element(&empty)?;
        tuple.serialize_element(&Root(self.0))?;
        tuple.serialize_element(&TraceAttributes(&self.0.event))?;
        tuple.end()
    }
}

/// Synthetic `ROOT` node wrapping the transaction node, which in turn
/// holds the retained segments.
struct Root<'a>(&'a HarvestTrace);

impl Serialize for Root<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let HarvestTrace { event, trace } = self.0;
        let duration = millis(event.duration);
        let txn_node = TxnNode {
            duration,
            name: &event.final_name,
            children: trace.roots_json(event.start),
        };
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&0)?;
        tuple.serialize_element(&duration)?;
        tuple.serialize_element("ROOT")?;
        tuple.serialize_element(&EmptyObject)?;
        tuple.serialize_element(&[txn_node])?;
        tuple.end()
    }
}

struct TxnNode<'a, C> {
    duration: u64,
    name: &'a str,
    children: C,
}

impl<C: Serialize> Serialize for TxnNode<'_, C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&0)?;
        tuple.serialize_element(&self.duration)?;
        tuple.serialize_element(self.name)?;
        tuple.serialize_element(&EmptyObject)?;
        tuple.serialize_element(&self.children)?;
        tuple.end()
    }
}

struct TraceAttributes<'a>(&'a TxnEvent);

impl Serialize for TraceAttributes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let event = self.0;
        let mut map = serializer.serialize_map(Some(3))?;
        match event.attrs.as_deref() {
            Some(attrs) => {
                map.serialize_entry(
                    "agentAttributes",
                    &attrs.agent_json(DestinationSet::TXN_TRACE),
                )?;
                map.serialize_entry(
                    "userAttributes",
                    &attrs.user_json(DestinationSet::TXN_TRACE, None),
                )?;
            }
            None => {
                map.serialize_entry("agentAttributes", &AgentAttributesJson::empty())?;
                map.serialize_entry("userAttributes", &UserAttributesJson::empty())?;
            }
        }
        map.serialize_entry("intrinsics", &Intrinsics(event))?;
        map.end()
    }
}

struct Intrinsics<'a>(&'a TxnEvent);

impl Serialize for Intrinsics<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let event = self.0;
        let mut map = serializer.serialize_map(None)?;
        if let Some(dt) = &event.distributed_trace {
            map.serialize_entry("guid", &dt.guid)?;
            map.serialize_entry("traceId", &dt.trace_id)?;
            map.serialize_entry("priority", &dt.priority)?;
            map.serialize_entry("sampled", &dt.sampled)?;
        }
        if let Some(synthetics) = &event.synthetics {
            map.serialize_entry("synthetics_resource_id", &synthetics.resource_id)?;
        }
        map.end()
    }
}

struct EmptyObject;

impl Serialize for EmptyObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}
