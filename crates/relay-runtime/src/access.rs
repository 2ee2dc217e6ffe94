// SPDX-License-Identifier: MIT OR Apache-2.0
//! Access control (§4.8): a first-matching-rule-wins list, default-allow.

use relay_subject::matches_pattern;
use serde::{Deserialize, Serialize};

/// One access control rule: if `from` and `to` both match, `allow` decides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRule {
    /// Stable id, surfaced in the denial reason (`access denied: <rule id>`).
    pub id: String,
    /// Pattern matched against the publisher's `from` subject.
    pub from: String,
    /// Pattern matched against the target endpoint subject.
    pub to: String,
    /// Whether a match permits or denies the publish.
    pub allow: bool,
}

/// Ordered rule list. Evaluated front-to-back; the first rule matching both
/// sides decides. With `default_deny` unset (the default), no match at all
/// allows — this is a local, trusted-host bus, not a perimeter firewall.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    rules: Vec<AccessRule>,
    default_deny: bool,
}

/// Outcome of [`AccessControl::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// No rule denied the publish (either a matching allow rule, or no
    /// match at all).
    Allowed,
    /// The named rule denied the publish.
    Denied {
        /// Id of the rule that denied the publish.
        rule_id: String,
    },
}

impl AccessControl {
    /// An access control list with no rules (everything allowed unless
    /// `default_deny` is set).
    #[must_use]
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self {
            rules,
            default_deny: false,
        }
    }

    /// Set whether an unmatched publish is denied rather than allowed.
    #[must_use]
    pub fn with_default_deny(mut self, default_deny: bool) -> Self {
        self.default_deny = default_deny;
        self
    }

    /// Current rule list, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Append a rule to the end of the evaluation order.
    pub fn push(&mut self, rule: AccessRule) {
        self.rules.push(rule);
    }

    /// Evaluate `from` publishing to `to` against the rule list.
    #[must_use]
    pub fn evaluate(&self, from: &str, to: &str) -> AccessDecision {
        for rule in &self.rules {
            if matches_pattern(from, &rule.from) && matches_pattern(to, &rule.to) {
                return if rule.allow {
                    AccessDecision::Allowed
                } else {
                    AccessDecision::Denied {
                        rule_id: rule.id.clone(),
                    }
                };
            }
        }
        if self.default_deny {
            AccessDecision::Denied {
                rule_id: "default-deny".to_string(),
            }
        } else {
            AccessDecision::Allowed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, from: &str, to: &str, allow: bool) -> AccessRule {
        AccessRule {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            allow,
        }
    }

    #[test]
    fn no_rules_defaults_to_allow() {
        let ac = AccessControl::new(vec![]);
        assert_eq!(
            ac.evaluate("relay.human.cli", "relay.agent.s1"),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let ac = AccessControl::new(vec![
            rule("r1", "relay.human.>", "relay.agent.>", true),
            rule("r2", "relay.human.>", "relay.agent.>", false),
        ]);
        assert_eq!(
            ac.evaluate("relay.human.cli", "relay.agent.s1"),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn denial_surfaces_rule_id() {
        let ac = AccessControl::new(vec![rule("blocklist-1", "relay.human.guest", "relay.agent.>", false)]);
        assert_eq!(
            ac.evaluate("relay.human.guest", "relay.agent.s1"),
            AccessDecision::Denied {
                rule_id: "blocklist-1".to_string()
            }
        );
    }

    #[test]
    fn default_deny_rejects_unmatched_publishes() {
        let ac = AccessControl::new(vec![]).with_default_deny(true);
        assert_eq!(
            ac.evaluate("relay.human.cli", "relay.agent.s1"),
            AccessDecision::Denied {
                rule_id: "default-deny".to_string()
            }
        );
    }

    #[test]
    fn non_matching_rule_falls_through_to_default_allow() {
        let ac = AccessControl::new(vec![rule("r1", "relay.human.guest", "relay.agent.>", false)]);
        assert_eq!(
            ac.evaluate("relay.human.admin", "relay.agent.s1"),
            AccessDecision::Allowed
        );
    }
}
