// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{
    truncate_to_byte_limit, AgentAttributeId, AttributeConfig, AttributeValue, DestinationSet,
};
use crate::constants::{
    ATTRIBUTE_KEY_LENGTH_LIMIT, ATTRIBUTE_USER_LIMIT, ATTRIBUTE_VALUE_LENGTH_LIMIT,
};
use crate::errors::AttributeError;
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use tracing::{debug, trace};

/// Attributes supplied at serialization time, e.g. the request URI of an
/// error. They take priority over stored user attributes of the same name.
pub type ExtraAttributes = HashMap<String, AttributeValue, FnvBuildHasher>;

#[derive(Debug, Clone, PartialEq)]
struct UserAttribute {
    value: AttributeValue,
    dests: DestinationSet,
}

#[derive(Debug, Clone, PartialEq)]
struct AgentAttributeValue {
    string_val: String,
    other_val: Option<AttributeValue>,
}

/// Attributes recorded by instrumentation. Their destinations are fixed by
/// the [`AttributeConfig`] at compile time, so writes are unconditional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentAttributes {
    values: [Option<AgentAttributeValue>; AgentAttributeId::COUNT],
}

impl AgentAttributes {
    /// Stores an agent attribute. Only one of `string_val` and `other_val`
    /// is expected; a non-empty `string_val` wins at serialization. Nothing
    /// is stored when both are empty.
    pub fn add(&mut self, id: AgentAttributeId, string_val: &str, other_val: Option<AttributeValue>) {
        if string_val.is_empty() && other_val.is_none() {
            return;
        }
        self.values[id.index()] = Some(AgentAttributeValue {
            string_val: truncate_to_byte_limit(string_val, ATTRIBUTE_VALUE_LENGTH_LIMIT)
                .to_string(),
            other_val,
        });
    }

    /// String value of `id`, empty when unset or non-string.
    pub fn string_val(&self, id: AgentAttributeId) -> &str {
        self.values[id.index()]
            .as_ref()
            .map_or("", |v| v.string_val.as_str())
    }

    pub fn contains(&self, id: AgentAttributeId) -> bool {
        self.values[id.index()].is_some()
    }

    fn iter(&self) -> impl Iterator<Item = (AgentAttributeId, &AgentAttributeValue)> {
        AgentAttributeId::ALL
            .into_iter()
            .filter_map(|id| self.values[id.index()].as_ref().map(|v| (id, v)))
    }
}

/// Key/value pairs attached to one transaction.
///
/// Created at transaction start against the session's shared
/// [`AttributeConfig`]. Once the transaction ends it is frozen behind an
/// `Arc` and only read by serialization.
#[derive(Debug, Clone)]
pub struct Attributes {
    config: Arc<AttributeConfig>,
    user: HashMap<String, UserAttribute, FnvBuildHasher>,
    pub agent: AgentAttributes,
}

impl Attributes {
    pub fn new(config: Arc<AttributeConfig>) -> Self {
        Self {
            config,
            user: HashMap::default(),
            agent: AgentAttributes::default(),
        }
    }

    pub fn config(&self) -> &AttributeConfig {
        &self.config
    }

    /// Records a caller-supplied attribute destined for `requested`.
    ///
    /// Attributes filtered down to no destination are silently discarded.
    /// Rewriting an existing key replaces its value; a new key beyond
    /// [`ATTRIBUTE_USER_LIMIT`] is rejected and existing entries are kept.
    pub fn add_user_attribute(
        &mut self,
        key: &str,
        value: impl Into<AttributeValue>,
        requested: DestinationSet,
    ) -> Result<(), AttributeError> {
        let value = validate_user_attribute(key, value.into()).inspect_err(|err| {
            debug!("Rejected user attribute: {err}");
        })?;

        let dests = self.config.resolve(key, requested);
        if dests.is_empty() {
            trace!("User attribute '{key}' filtered out of every destination");
            return Ok(());
        }

        if !self.user.contains_key(key) && self.user.len() >= ATTRIBUTE_USER_LIMIT {
            let err = AttributeError::UserLimitReached {
                key: key.to_string(),
            };
            debug!("Rejected user attribute: {err}");
            return Err(err);
        }

        self.user
            .insert(key.to_string(), UserAttribute { value, dests });
        Ok(())
    }

    pub fn user_attribute_count(&self) -> usize {
        self.user.len()
    }

    pub fn user_value(&self, key: &str) -> Option<&AttributeValue> {
        self.user.get(key).map(|attr| &attr.value)
    }

    /// Serializable view of the agent attributes allowed in `dest`.
    pub fn agent_json(&self, dest: DestinationSet) -> AgentAttributesJson<'_> {
        AgentAttributesJson {
            attrs: Some(self),
            dest,
        }
    }

    /// Serializable view of the user attributes allowed in `dest`, with
    /// `extra` merged on top.
    pub fn user_json<'a>(
        &'a self,
        dest: DestinationSet,
        extra: Option<&'a ExtraAttributes>,
    ) -> UserAttributesJson<'a> {
        UserAttributesJson {
            attrs: Some(self),
            dest,
            extra,
        }
    }
}

/// Checks the key length and value type of a user attribute, truncating
/// long string values.
pub fn validate_user_attribute(
    key: &str,
    value: AttributeValue,
) -> Result<AttributeValue, AttributeError> {
    let value = match value {
        AttributeValue::String(s) if s.len() > ATTRIBUTE_VALUE_LENGTH_LIMIT => {
            AttributeValue::String(truncate_to_byte_limit(&s, ATTRIBUTE_VALUE_LENGTH_LIMIT).to_string())
        }
        AttributeValue::Unsupported(type_name) => {
            return Err(AttributeError::InvalidType {
                key: key.to_string(),
                type_name,
            });
        }
        other => other,
    };

    // Long keys are dropped rather than truncated so that filtering rules
    // are always evaluated against the key as written.
    if key.len() > ATTRIBUTE_KEY_LENGTH_LIMIT {
        return Err(AttributeError::KeyTooLong {
            key: key.to_string(),
        });
    }

    Ok(value)
}

pub struct AgentAttributesJson<'a> {
    attrs: Option<&'a Attributes>,
    dest: DestinationSet,
}

impl AgentAttributesJson<'_> {
    /// Renders `{}`.
    pub fn empty() -> Self {
        Self {
            attrs: None,
            dest: DestinationSet::NONE,
        }
    }
}

impl Serialize for AgentAttributesJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(attrs) = self.attrs {
            for (id, val) in attrs.agent.iter() {
                if !attrs.config.agent_destinations(id).intersects(self.dest) {
                    continue;
                }
                if !val.string_val.is_empty() {
                    map.serialize_entry(id.name(), &val.string_val)?;
                } else if let Some(other) = &val.other_val {
                    map.serialize_entry(id.name(), other)?;
                }
            }
        }
        map.end()
    }
}

pub struct UserAttributesJson<'a> {
    attrs: Option<&'a Attributes>,
    dest: DestinationSet,
    extra: Option<&'a ExtraAttributes>,
}

impl UserAttributesJson<'_> {
    /// Renders `{}`.
    pub fn empty() -> Self {
        Self {
            attrs: None,
            dest: DestinationSet::NONE,
            extra: None,
        }
    }
}

impl Serialize for UserAttributesJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(attrs) = self.attrs {
            if let Some(extra) = self.extra {
                for (key, value) in extra {
                    if attrs.config.resolve(key, self.dest).intersects(self.dest) {
                        map.serialize_entry(key, value)?;
                    }
                }
            }
            for (key, attr) in &attrs.user {
                if !attr.dests.intersects(self.dest) {
                    continue;
                }
                if self.extra.is_some_and(|extra| extra.contains_key(key)) {
                    continue;
                }
                map.serialize_entry(key, &attr.value)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttributeConfigInput;
    use serde_json::{json, Value};
    use tracing_test::traced_test;

    fn attributes_with(input: AttributeConfigInput) -> Attributes {
        Attributes::new(Arc::new(AttributeConfig::new(&input, true)))
    }

    fn user_json(attrs: &Attributes, dest: DestinationSet, extra: Option<&ExtraAttributes>) -> Value {
        serde_json::to_value(attrs.user_json(dest, extra)).unwrap()
    }

    #[test]
    fn test_user_attribute_round_trip() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        attrs
            .add_user_attribute("zap", 123, DestinationSet::ALL)
            .unwrap();
        attrs
            .add_user_attribute("zip", "zop", DestinationSet::ALL)
            .unwrap();
        attrs
            .add_user_attribute("nil", (), DestinationSet::ALL)
            .unwrap();
        assert_eq!(
            user_json(&attrs, DestinationSet::TXN_TRACE, None),
            json!({"zap": 123, "zip": "zop", "nil": null})
        );
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        attrs.add_user_attribute("k", 1, DestinationSet::ALL).unwrap();
        attrs.add_user_attribute("k", true, DestinationSet::ALL).unwrap();
        assert_eq!(attrs.user_attribute_count(), 1);
        assert_eq!(attrs.user_value("k"), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        let err = attrs
            .add_user_attribute("k", json!([1, 2, 3]), DestinationSet::ALL)
            .unwrap_err();
        assert_eq!(
            err,
            AttributeError::InvalidType {
                key: "k".to_string(),
                type_name: "array".to_string()
            }
        );
        assert_eq!(attrs.user_attribute_count(), 0);
    }

    #[test]
    fn test_long_key_rejected_and_prior_kept() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        attrs.add_user_attribute("kept", 1, DestinationSet::ALL).unwrap();

        let long_key = "x".repeat(ATTRIBUTE_KEY_LENGTH_LIMIT + 1);
        let err = attrs
            .add_user_attribute(&long_key, 2, DestinationSet::ALL)
            .unwrap_err();
        assert!(matches!(err, AttributeError::KeyTooLong { .. }));
        assert_eq!(attrs.user_attribute_count(), 1);
        assert_eq!(attrs.user_value("kept"), Some(&AttributeValue::Int(1)));

        let max_key = "x".repeat(ATTRIBUTE_KEY_LENGTH_LIMIT);
        assert!(attrs
            .add_user_attribute(&max_key, 2, DestinationSet::ALL)
            .is_ok());
    }

    #[test]
    fn test_long_string_value_truncated() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        let value = "v".repeat(ATTRIBUTE_VALUE_LENGTH_LIMIT + 10);
        attrs
            .add_user_attribute("k", value.as_str(), DestinationSet::ALL)
            .unwrap();
        let stored = attrs.user_value("k").and_then(AttributeValue::as_str).unwrap();
        assert_eq!(stored.len(), ATTRIBUTE_VALUE_LENGTH_LIMIT);
    }

    #[test]
    #[traced_test]
    fn test_user_limit() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        for i in 0..ATTRIBUTE_USER_LIMIT {
            attrs
                .add_user_attribute(&format!("k{i}"), i, DestinationSet::ALL)
                .unwrap();
        }
        let err = attrs
            .add_user_attribute("overflow", 1, DestinationSet::ALL)
            .unwrap_err();
        assert_eq!(
            err,
            AttributeError::UserLimitReached {
                key: "overflow".to_string()
            }
        );
        assert_eq!(attrs.user_attribute_count(), ATTRIBUTE_USER_LIMIT);
        assert!(logs_contain("limit of 64 reached"));

        // Overwriting an existing key is still allowed at the limit.
        attrs.add_user_attribute("k0", "new", DestinationSet::ALL).unwrap();
        assert_eq!(attrs.user_value("k0"), Some(&AttributeValue::from("new")));
    }

    #[test]
    fn test_filtered_attribute_silently_discarded() {
        let mut input = AttributeConfigInput::default();
        input.attributes.exclude = vec!["secret*".to_string()];
        let mut attrs = attributes_with(input);
        assert!(attrs
            .add_user_attribute("secret.token", "abc", DestinationSet::ALL)
            .is_ok());
        assert_eq!(attrs.user_attribute_count(), 0);
    }

    #[test]
    fn test_serialization_respects_destinations() {
        let mut input = AttributeConfigInput::default();
        input.transaction_tracer.exclude = vec!["hidden".to_string()];
        let mut attrs = attributes_with(input);
        attrs.add_user_attribute("hidden", 1, DestinationSet::ALL).unwrap();
        attrs
            .add_user_attribute("errors_only", 2, DestinationSet::ERROR)
            .unwrap();

        assert_eq!(user_json(&attrs, DestinationSet::TXN_TRACE, None), json!({}));
        assert_eq!(
            user_json(&attrs, DestinationSet::ERROR, None),
            json!({"hidden": 1, "errors_only": 2})
        );
    }

    #[test]
    fn test_extra_attributes_take_priority() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        attrs
            .add_user_attribute("request.uri", "/stored", DestinationSet::ALL)
            .unwrap();
        attrs.add_user_attribute("other", 1, DestinationSet::ALL).unwrap();

        let mut extra = ExtraAttributes::default();
        extra.insert("request.uri".to_string(), AttributeValue::from("/extra"));
        assert_eq!(
            user_json(&attrs, DestinationSet::ERROR, Some(&extra)),
            json!({"request.uri": "/extra", "other": 1})
        );
    }

    #[test]
    fn test_agent_attributes() {
        let mut attrs = attributes_with(AttributeConfigInput::default());
        attrs.agent.add(AgentAttributeId::RequestUri, "", None);
        assert!(!attrs.agent.contains(AgentAttributeId::RequestUri));

        attrs.agent.add(AgentAttributeId::RequestUri, "/url", None);
        attrs
            .agent
            .add(AgentAttributeId::AwsLambdaColdStart, "", Some(true.into()));
        attrs.agent.add(
            AgentAttributeId::ResponseCode,
            "200",
            Some(AttributeValue::Int(200)),
        );
        attrs.agent.add(
            AgentAttributeId::HostDisplayName,
            "",
            Some(AttributeValue::unsupported::<Vec<u8>>()),
        );

        assert_eq!(attrs.agent.string_val(AgentAttributeId::RequestUri), "/url");
        let label = std::any::type_name::<Vec<u8>>();
        let js = serde_json::to_value(attrs.agent_json(DestinationSet::TXN_TRACE)).unwrap();
        assert_eq!(
            js,
            json!({
                "request.uri": "/url",
                "aws.lambda.coldStart": true,
                "httpResponseCode": "200",
                "host.displayName": label,
            })
        );
        assert_eq!(
            serde_json::to_value(attrs.agent_json(DestinationSet::BROWSER)).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_agent_attribute_excluded_by_config() {
        let mut input = AttributeConfigInput::default();
        input.transaction_tracer.exclude = vec!["request.uri".to_string()];
        let mut attrs = attributes_with(input);
        attrs.agent.add(AgentAttributeId::RequestUri, "/url", None);
        assert_eq!(
            serde_json::to_value(attrs.agent_json(DestinationSet::TXN_TRACE)).unwrap(),
            json!({})
        );
        assert_eq!(
            serde_json::to_value(attrs.agent_json(DestinationSet::TXN_EVENT)).unwrap(),
            json!({"request.uri": "/url"})
        );
    }

    #[test]
    fn test_empty_views() {
        assert_eq!(
            serde_json::to_string(&AgentAttributesJson::empty()).unwrap(),
            "{}"
        );
        assert_eq!(
            serde_json::to_string(&UserAttributesJson::empty()).unwrap(),
            "{}"
        );
    }
}
