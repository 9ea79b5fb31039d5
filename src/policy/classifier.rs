//! Idempotency classification of chain-returned errors.
//!
//! Target chains expose no structured codes for "this already happened"; the only
//! signal is the wording of the rejection. All matching lives in one ordered phrase
//! table so a change in a node's wording is a one-line table edit. Anything that does
//! not match a known phrase is Fatal.
//!
//! Rules scoped to an action kind are consulted before the general table when the
//! caller names the kind being proposed.

use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::error::GovernanceError;

/// What a failed submission means for the protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Desired end state already holds; treat as success, do not retry
    AlreadyApplied,
    /// Proposal already exists on-chain; only approvals remain
    AlreadyPending,
    /// Abort the action
    Fatal,
}

/// One entry of the phrase table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRule {
    pub phrase: String,
    pub classification: Classification,
}

impl PhraseRule {
    pub fn new(phrase: impl Into<String>, classification: Classification) -> Self {
        Self { phrase: phrase.into(), classification }
    }
}

/// Known terminal-state phrases returned by relay chain nodes.
pub const DEFAULT_PHRASES: &[(&str, Classification)] = &[
    // genesis header already synced
    ("had been initialized", Classification::AlreadyApplied),
    ("already registered", Classification::AlreadyApplied),
    ("already requested", Classification::AlreadyPending),
];

/// Phrases that mean something different for one action kind.
pub const DEFAULT_ACTION_PHRASES: &[(ActionKind, &str, Classification)] = &[
    // a registered candidate still needs its approvals
    (ActionKind::RegisterCandidate, "already", Classification::AlreadyPending),
];

/// Ordered phrase table; the first rule whose phrase occurs in the message wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdempotencyClassifier {
    rules: Vec<PhraseRule>,
    scoped: Vec<(ActionKind, PhraseRule)>,
}

impl IdempotencyClassifier {
    /// Classifier with only the given general rules.
    pub fn new(rules: Vec<PhraseRule>) -> Self {
        Self { rules, scoped: Vec::new() }
    }

    /// Append a rule after the existing ones.
    pub fn with_rule(mut self, rule: PhraseRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append a rule that applies only to proposals of `kind`.
    pub fn with_action_rule(mut self, kind: ActionKind, rule: PhraseRule) -> Self {
        self.scoped.push((kind, rule));
        self
    }

    pub fn rules(&self) -> &[PhraseRule] {
        &self.rules
    }

    /// Classify raw rejection text. Case-sensitive substring match.
    pub fn classify_message(&self, message: &str) -> Classification {
        first_match(self.rules.iter(), message).unwrap_or(Classification::Fatal)
    }

    /// Like [`classify_message`](Self::classify_message), trying `kind`'s own
    /// rules first.
    pub fn classify_message_for(&self, kind: ActionKind, message: &str) -> Classification {
        let scoped = self.scoped.iter().filter(|(k, _)| *k == kind).map(|(_, rule)| rule);
        first_match(scoped, message).unwrap_or_else(|| self.classify_message(message))
    }

    /// Classify an error. Only chain rejections can be idempotent; transport
    /// failures, timeouts and local errors are always Fatal.
    pub fn classify(&self, err: &GovernanceError) -> Classification {
        match err {
            GovernanceError::ChainRejected { message } => self.classify_message(message),
            _ => Classification::Fatal,
        }
    }

    /// Classify the rejection of a proposal of `kind`.
    pub fn classify_for(&self, kind: ActionKind, err: &GovernanceError) -> Classification {
        match err {
            GovernanceError::ChainRejected { message } => self.classify_message_for(kind, message),
            _ => Classification::Fatal,
        }
    }
}

fn first_match<'a>(
    mut rules: impl Iterator<Item = &'a PhraseRule>,
    message: &str,
) -> Option<Classification> {
    rules
        .find(|rule| !rule.phrase.is_empty() && message.contains(rule.phrase.as_str()))
        .map(|rule| rule.classification)
}

impl Default for IdempotencyClassifier {
    fn default() -> Self {
        let rules = DEFAULT_PHRASES
            .iter()
            .map(|(phrase, classification)| PhraseRule::new(*phrase, *classification))
            .collect();
        DEFAULT_ACTION_PHRASES
            .iter()
            .fold(Self::new(rules), |classifier, (kind, phrase, classification)| {
                classifier.with_action_rule(*kind, PhraseRule::new(*phrase, *classification))
            })
    }
}
