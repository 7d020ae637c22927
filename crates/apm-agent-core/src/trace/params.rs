// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::attributes::{validate_user_attribute, AttributeValue};
use crate::constants::{
    DATASTORE_OPERATION_UNKNOWN, DATASTORE_PRODUCT_UNKNOWN, MAX_STACK_TRACE_FRAMES,
};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Call stack captured when a segment ends.
#[derive(Clone)]
pub struct StackTrace(Arc<Backtrace>);

impl StackTrace {
    pub fn capture() -> Self {
        Self(Arc::new(Backtrace::force_capture()))
    }

    /// One entry per frame: the symbol, followed by its location if known.
    pub fn frames(&self) -> Vec<String> {
        let rendered = self.0.to_string();
        let mut frames: Vec<String> = Vec::new();
        for line in rendered.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(location) = line.strip_prefix("at ") {
                if let Some(last) = frames.last_mut() {
                    last.push_str(" (");
                    last.push_str(location);
                    last.push(')');
                }
                continue;
            }
            if frames.len() == MAX_STACK_TRACE_FRAMES {
                break;
            }
            let symbol = line
                .split_once(": ")
                .filter(|(index, _)| index.chars().all(|c| c.is_ascii_digit()))
                .map_or(line, |(_, symbol)| symbol);
            frames.push(symbol.to_string());
        }
        frames
    }
}

impl fmt::Debug for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StackTrace(..)")
    }
}

impl Serialize for StackTrace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let frames = self.frames();
        let mut seq = serializer.serialize_seq(Some(frames.len()))?;
        for frame in &frames {
            seq.serialize_element(frame)?;
        }
        seq.end()
    }
}

/// Optional details attached to a trace node.
#[derive(Debug, Clone, Default)]
pub struct TraceNodeParams {
    pub stack_trace: Option<StackTrace>,
    pub clean_url: String,
    pub database: String,
    pub host: String,
    pub port_path_or_id: String,
    pub query: String,
    pub query_parameters: Option<BTreeMap<String, AttributeValue>>,
}

impl Serialize for TraceNodeParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(stack_trace) = &self.stack_trace {
            map.serialize_entry("backtrace", stack_trace)?;
        }
        for (key, value) in [
            ("uri", &self.clean_url),
            ("database_name", &self.database),
            ("host", &self.host),
            ("port_path_or_id", &self.port_path_or_id),
            ("query", &self.query),
        ] {
            if !value.is_empty() {
                map.serialize_entry(key, value)?;
            }
        }
        if let Some(query_parameters) = &self.query_parameters {
            map.serialize_entry("query_parameters", query_parameters)?;
        }
        map.end()
    }
}

/// Description of a finished datastore call.
#[derive(Debug, Clone, Default)]
pub struct DatastoreSegment {
    pub product: String,
    pub collection: String,
    pub operation: String,
    pub parameterized_query: String,
    pub query_parameters: BTreeMap<String, AttributeValue>,
    pub database: String,
    pub host: String,
    pub port_path_or_id: String,
}

impl DatastoreSegment {
    fn product(&self) -> &str {
        non_empty_or(&self.product, DATASTORE_PRODUCT_UNKNOWN)
    }

    fn operation(&self) -> &str {
        non_empty_or(&self.operation, DATASTORE_OPERATION_UNKNOWN)
    }

    pub(crate) fn node_name(&self) -> String {
        if self.collection.is_empty() {
            format!("Datastore/operation/{}/{}", self.product(), self.operation())
        } else {
            format!(
                "Datastore/statement/{}/{}/{}",
                self.product(),
                self.collection,
                self.operation()
            )
        }
    }

    pub(crate) fn into_params(self, stack_trace: Option<StackTrace>) -> TraceNodeParams {
        let query = if self.parameterized_query.is_empty() {
            format!(
                "'{}' on '{}' using '{}'",
                self.operation(),
                non_empty_or(&self.collection, "unknown"),
                self.product()
            )
        } else {
            self.parameterized_query
        };
        TraceNodeParams {
            stack_trace,
            clean_url: String::new(),
            database: self.database,
            host: self.host,
            port_path_or_id: self.port_path_or_id,
            query,
            query_parameters: vet_query_parameters(self.query_parameters),
        }
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Drops parameters with oversized keys or unsupported values and truncates
/// long strings.
fn vet_query_parameters(
    params: BTreeMap<String, AttributeValue>,
) -> Option<BTreeMap<String, AttributeValue>> {
    let vetted: BTreeMap<_, _> = params
        .into_iter()
        .filter_map(|(key, value)| {
            validate_user_attribute(&key, value)
                .ok()
                .map(|value| (key, value))
        })
        .collect();
    (!vetted.is_empty()).then_some(vetted)
}
