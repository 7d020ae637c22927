// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::DestinationSet;

/// Attributes produced by the agent's own instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentAttributeId {
    HostDisplayName,
    RequestMethod,
    RequestAcceptHeader,
    RequestContentType,
    RequestContentLength,
    RequestHeadersHost,
    RequestHeadersUserAgent,
    RequestHeadersReferer,
    RequestUri,
    ResponseHeadersContentType,
    ResponseHeadersContentLength,
    ResponseCode,
    AwsRequestId,
    AwsLambdaArn,
    AwsLambdaColdStart,
    AwsLambdaEventSourceArn,
}

impl AgentAttributeId {
    pub const COUNT: usize = 16;

    pub const ALL: [AgentAttributeId; Self::COUNT] = [
        Self::HostDisplayName,
        Self::RequestMethod,
        Self::RequestAcceptHeader,
        Self::RequestContentType,
        Self::RequestContentLength,
        Self::RequestHeadersHost,
        Self::RequestHeadersUserAgent,
        Self::RequestHeadersReferer,
        Self::RequestUri,
        Self::ResponseHeadersContentType,
        Self::ResponseHeadersContentLength,
        Self::ResponseCode,
        Self::AwsRequestId,
        Self::AwsLambdaArn,
        Self::AwsLambdaColdStart,
        Self::AwsLambdaEventSourceArn,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::HostDisplayName => "host.displayName",
            Self::RequestMethod => "request.method",
            Self::RequestAcceptHeader => "request.headers.accept",
            Self::RequestContentType => "request.headers.contentType",
            Self::RequestContentLength => "request.headers.contentLength",
            Self::RequestHeadersHost => "request.headers.host",
            Self::RequestHeadersUserAgent => "request.headers.User-Agent",
            Self::RequestHeadersReferer => "request.headers.referer",
            Self::RequestUri => "request.uri",
            Self::ResponseHeadersContentType => "response.headers.contentType",
            Self::ResponseHeadersContentLength => "response.headers.contentLength",
            Self::ResponseCode => "httpResponseCode",
            Self::AwsRequestId => "aws.requestId",
            Self::AwsLambdaArn => "aws.lambda.arn",
            Self::AwsLambdaColdStart => "aws.lambda.coldStart",
            Self::AwsLambdaEventSourceArn => "aws.lambda.eventSource.arn",
        }
    }

    /// Destinations before any include/exclude rule is applied.
    pub const fn default_destinations(self) -> DestinationSet {
        match self {
            Self::RequestHeadersUserAgent | Self::RequestHeadersReferer => DestinationSet::TRACES,
            _ => DestinationSet::USUAL,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}
