// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Attribute keys longer than this many bytes are dropped, never truncated.
pub const ATTRIBUTE_KEY_LENGTH_LIMIT: usize = 255;

/// String attribute values are truncated to this many bytes.
pub const ATTRIBUTE_VALUE_LENGTH_LIMIT: usize = 255;

/// Maximum number of distinct user attributes per transaction.
pub const ATTRIBUTE_USER_LIMIT: usize = 64;

/// Default node cap of a transaction trace.
pub const MAX_TXN_TRACE_NODES: usize = 10_000;

/// Default number of synthetic traces retained per harvest window.
pub const MAX_SYNTHETICS_TRACES: usize = 20;

pub const DEFAULT_SEGMENT_THRESHOLD: Duration = Duration::from_millis(2);

pub const DEFAULT_STACK_TRACE_THRESHOLD: Duration = Duration::from_millis(500);

/// Frames kept from a captured stack trace.
pub const MAX_STACK_TRACE_FRAMES: usize = 100;

pub const DATASTORE_PRODUCT_UNKNOWN: &str = "Unknown";

pub const DATASTORE_OPERATION_UNKNOWN: &str = "other";

pub const EXTERNAL_HOST_UNKNOWN: &str = "unknown";

pub const CUSTOM_SEGMENT_PREFIX: &str = "Custom/";

pub const DEFAULT_LOG_LEVEL: &str = "info";
