//! The `PatchRule` contract and the ordered rule set.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use lessonforge_markup::RenameMap;
use lessonforge_shared::{Result, RuleSpec};

use crate::rules;

/// What a rule did to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// The guard was false and the rule changed the text.
    Applied,
    /// The guard was already satisfied; the text is untouched.
    AlreadyApplied,
    /// The rule's anchor is absent; the text is untouched.
    AnchorMissing,
}

/// Text produced by one rule plus its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub text: String,
    pub status: RuleStatus,
}

impl RuleOutcome {
    pub fn applied(text: String) -> Self {
        Self {
            text,
            status: RuleStatus::Applied,
        }
    }

    pub fn unchanged(body: &str, status: RuleStatus) -> Self {
        Self {
            text: body.to_string(),
            status,
        }
    }
}

/// A guarded, idempotent text patch.
///
/// Implementations must uphold two properties for every `body`:
///
/// - `is_applied(body)` ⇒ [`run`](PatchRule::run) returns `body` unchanged
/// - `!is_applied(body)` ⇒ `is_applied(apply(body))`, unless the rule reports
///   [`RuleStatus::AnchorMissing`] and leaves `body` unchanged
///
/// Guards may fail with `AmbiguousAnchor` when a unique anchor is duplicated.
pub trait PatchRule: fmt::Debug {
    /// Name used in logs and per-rule report counts.
    fn name(&self) -> &str;

    /// Guard: has this rule already taken effect on `body`?
    fn is_applied(&self, body: &str) -> Result<bool>;

    /// Make the guard true. Only called when the guard is false.
    fn apply(&self, body: &str) -> Result<RuleOutcome>;

    /// Check the guard, then apply if needed.
    fn run(&self, body: &str) -> Result<RuleOutcome> {
        if self.is_applied(body)? {
            return Ok(RuleOutcome::unchanged(body, RuleStatus::AlreadyApplied));
        }
        self.apply(body)
    }
}

/// Result of running a whole [`PatchSet`] over one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub text: String,
    /// Rules that changed the text, in application order.
    pub applied: Vec<String>,
    /// Rules skipped because their anchor was absent.
    pub anchor_missing: Vec<String>,
}

impl PatchOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// An ordered list of rules; each rule sees the previous rule's output.
#[derive(Debug, Default)]
pub struct PatchSet {
    rules: Vec<Box<dyn PatchRule>>,
}

impl PatchSet {
    pub fn new(rules: Vec<Box<dyn PatchRule>>) -> Self {
        Self { rules }
    }

    /// Build rules from configuration. Invalid rules fail the whole set.
    pub fn from_specs(specs: &[RuleSpec], classes: &RenameMap) -> Result<Self> {
        let rules = specs
            .iter()
            .map(|spec| rules::build(spec, classes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Names of the rules, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name())
    }

    /// Apply every rule in order.
    ///
    /// An error from any rule aborts the set for this document; the caller
    /// keeps the original text.
    pub fn apply(&self, body: &str) -> Result<PatchOutcome> {
        let mut outcome = PatchOutcome {
            text: body.to_string(),
            ..PatchOutcome::default()
        };

        for rule in &self.rules {
            let step = rule.run(&outcome.text)?;
            match step.status {
                RuleStatus::Applied if step.text != outcome.text => {
                    debug!(rule = rule.name(), "rule applied");
                    outcome.applied.push(rule.name().to_string());
                    outcome.text = step.text;
                }
                RuleStatus::Applied | RuleStatus::AlreadyApplied => {}
                RuleStatus::AnchorMissing => {
                    warn!(rule = rule.name(), "anchor missing, rule skipped");
                    outcome.anchor_missing.push(rule.name().to_string());
                }
            }
        }

        Ok(outcome)
    }
}
