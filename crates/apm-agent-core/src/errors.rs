// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{ATTRIBUTE_KEY_LENGTH_LIMIT, ATTRIBUTE_USER_LIMIT};

/// Reasons a single user attribute is rejected. The transaction is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("attribute '{key}' value of type {type_name} is invalid")]
    InvalidType { key: String, type_name: String },

    #[error(
        "attribute key '{}...' exceeds length limit {}",
        key_prefix(.key),
        ATTRIBUTE_KEY_LENGTH_LIMIT
    )]
    KeyTooLong { key: String },

    #[error("attribute '{key}' discarded: limit of {} reached", ATTRIBUTE_USER_LIMIT)]
    UserLimitReached { key: String },
}

fn key_prefix(key: &str) -> &str {
    crate::attributes::truncate_to_byte_limit(key, 32)
}

/// Returned when a segment handle does not match the open segment stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("segment handle is malformed")]
    Malformed,

    #[error("segment ended out of order")]
    OutOfOrder,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("Failed to encode transaction traces: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Harvest service unavailable: {0}")]
    ServiceUnavailable(String),
}
