// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{AgentAttributeId, DestinationSet};
use crate::config::{AttributeConfigInput, AttributeDestinationConfig};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;

const WILDCARD_SUFFIX: char = '*';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IncludeExclude {
    include: DestinationSet,
    exclude: DestinationSet,
}

impl IncludeExclude {
    fn merge(&mut self, other: IncludeExclude) {
        self.include |= other.include;
        self.exclude |= other.exclude;
    }

    /// Include first, then exclude: exclusion wins within one modifier.
    fn apply(self, dests: DestinationSet) -> DestinationSet {
        (dests | self.include).without(self.exclude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WildcardModifier {
    prefix: String,
    rule: IncludeExclude,
}

/// Compiled attribute filtering rules.
///
/// Built once per agent session and shared read-only (typically behind an
/// `Arc`) by every transaction of that session.
#[derive(Debug, Clone)]
pub struct AttributeConfig {
    disabled_destinations: DestinationSet,
    exact_modifiers: HashMap<String, IncludeExclude, FnvBuildHasher>,
    /// Sorted ascending by prefix; later entries take precedence.
    wildcard_modifiers: Vec<WildcardModifier>,
    agent_destinations: [DestinationSet; AgentAttributeId::COUNT],
}

impl AttributeConfig {
    /// Compiles `input` into a rule set.
    ///
    /// A disabled category disables its destination outright. Include
    /// patterns are only honored when `include_enabled` is set; exclude
    /// patterns always are. Patterns ending in `*` match by prefix, empty
    /// patterns are ignored.
    pub fn new(input: &AttributeConfigInput, include_enabled: bool) -> Self {
        let mut config = Self {
            disabled_destinations: DestinationSet::NONE,
            exact_modifiers: HashMap::default(),
            wildcard_modifiers: Vec::with_capacity(64),
            agent_destinations: [DestinationSet::NONE; AgentAttributeId::COUNT],
        };

        config.process_destination(&input.attributes, include_enabled, DestinationSet::ALL);
        config.process_destination(
            &input.error_collector,
            include_enabled,
            DestinationSet::ERROR,
        );
        config.process_destination(
            &input.transaction_events,
            include_enabled,
            DestinationSet::TXN_EVENT,
        );
        config.process_destination(
            &input.transaction_tracer,
            include_enabled,
            DestinationSet::TXN_TRACE,
        );
        config.process_destination(
            &input.browser_monitoring,
            include_enabled,
            DestinationSet::BROWSER,
        );

        config
            .wildcard_modifiers
            .sort_by(|a, b| a.prefix.cmp(&b.prefix));

        for id in AgentAttributeId::ALL {
            config.agent_destinations[id.index()] =
                config.resolve(id.name(), id.default_destinations());
        }

        config
    }

    /// Destinations `key` may reach, starting from `defaults`.
    ///
    /// Matching wildcard modifiers are folded in ascending prefix order, then
    /// the exact modifier for `key` (if any), then disabled destinations are
    /// cleared.
    pub fn resolve(&self, key: &str, defaults: DestinationSet) -> DestinationSet {
        let mut dests = defaults;

        for modifier in &self.wildcard_modifiers {
            if key.starts_with(modifier.prefix.as_str()) {
                dests = modifier.rule.apply(dests);
            }
        }

        if let Some(rule) = self.exact_modifiers.get(key) {
            dests = rule.apply(dests);
        }

        dests.without(self.disabled_destinations)
    }

    /// Precomputed destinations of an agent attribute.
    pub fn agent_destinations(&self, id: AgentAttributeId) -> DestinationSet {
        self.agent_destinations[id.index()]
    }

    pub fn disabled_destinations(&self) -> DestinationSet {
        self.disabled_destinations
    }

    fn process_destination(
        &mut self,
        category: &AttributeDestinationConfig,
        include_enabled: bool,
        dest: DestinationSet,
    ) {
        if !category.enabled {
            self.disabled_destinations |= dest;
        }
        if include_enabled {
            for pattern in &category.include {
                self.add_modifier(
                    pattern,
                    IncludeExclude {
                        include: dest,
                        exclude: DestinationSet::NONE,
                    },
                );
            }
        }
        for pattern in &category.exclude {
            self.add_modifier(
                pattern,
                IncludeExclude {
                    include: DestinationSet::NONE,
                    exclude: dest,
                },
            );
        }
    }

    fn add_modifier(&mut self, pattern: &str, rule: IncludeExclude) {
        if pattern.is_empty() {
            return;
        }

        let Some(prefix) = pattern.strip_suffix(WILDCARD_SUFFIX) else {
            self.exact_modifiers
                .entry(pattern.to_string())
                .or_default()
                .merge(rule);
            return;
        };

        // One entry per prefix: separate include and exclude entries for the
        // same prefix would lose exclude's precedence after sorting.
        match self
            .wildcard_modifiers
            .iter_mut()
            .find(|modifier| modifier.prefix == prefix)
        {
            Some(existing) => existing.rule.merge(rule),
            None => self.wildcard_modifiers.push(WildcardModifier {
                prefix: prefix.to_string(),
                rule,
            }),
        }
    }
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self::new(&AttributeConfigInput::default(), true)
    }
}
