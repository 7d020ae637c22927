// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Attribute storage and destination filtering.
//!
//! An [`AttributeConfig`] is compiled once per agent session from include and
//! exclude patterns and shared read-only by every transaction. Each
//! transaction records its key/values in an [`Attributes`] container, which
//! resolves and remembers the destinations every user attribute may reach.

mod agent;
mod config;
mod container;
mod destinations;
mod http;
mod value;

pub use agent::AgentAttributeId;
pub use config::AttributeConfig;
pub use container::{
    validate_user_attribute, AgentAttributes, AgentAttributesJson, Attributes, ExtraAttributes,
    UserAttributesJson,
};
pub use destinations::DestinationSet;
pub use http::{request_agent_attributes, response_code_attribute, response_header_attributes};
pub use value::AttributeValue;

/// Returns the longest prefix of `value` that fits in `limit` bytes without
/// splitting a UTF-8 character.
pub fn truncate_to_byte_limit(value: &str, limit: usize) -> &str {
    if value.len() <= limit {
        return value;
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
