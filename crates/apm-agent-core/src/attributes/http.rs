// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent attributes gathered from HTTP requests and responses.

use super::{AgentAttributeId, AttributeValue, Attributes};
use crate::trace::safe_url_from_str;
use http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HOST, REFERER, USER_AGENT};
use http::{HeaderMap, HeaderName};

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

fn content_length(headers: &HeaderMap) -> Option<i64> {
    header_str(headers, &CONTENT_LENGTH)
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|len| *len >= 0)
}

/// Records the request method and the interesting request headers.
pub fn request_agent_attributes(attrs: &mut Attributes, method: &str, headers: Option<&HeaderMap>) {
    attrs.agent.add(AgentAttributeId::RequestMethod, method, None);

    let Some(headers) = headers else {
        return;
    };
    let agent = &mut attrs.agent;
    agent.add(
        AgentAttributeId::RequestAcceptHeader,
        header_str(headers, &ACCEPT),
        None,
    );
    agent.add(
        AgentAttributeId::RequestContentType,
        header_str(headers, &CONTENT_TYPE),
        None,
    );
    agent.add(
        AgentAttributeId::RequestHeadersHost,
        header_str(headers, &HOST),
        None,
    );
    agent.add(
        AgentAttributeId::RequestHeadersUserAgent,
        header_str(headers, &USER_AGENT),
        None,
    );
    agent.add(
        AgentAttributeId::RequestHeadersReferer,
        &safe_url_from_str(header_str(headers, &REFERER)),
        None,
    );

    if let Some(len) = content_length(headers) {
        agent.add(
            AgentAttributeId::RequestContentLength,
            "",
            Some(AttributeValue::Int(len)),
        );
    }
}

pub fn response_header_attributes(attrs: &mut Attributes, headers: Option<&HeaderMap>) {
    let Some(headers) = headers else {
        return;
    };
    attrs.agent.add(
        AgentAttributeId::ResponseHeadersContentType,
        header_str(headers, &CONTENT_TYPE),
        None,
    );
    if let Some(len) = content_length(headers) {
        attrs.agent.add(
            AgentAttributeId::ResponseHeadersContentLength,
            "",
            Some(AttributeValue::Int(len)),
        );
    }
}

pub fn response_code_attribute(attrs: &mut Attributes, code: u16) {
    attrs
        .agent
        .add(AgentAttributeId::ResponseCode, &code.to_string(), None);
}
