//! Idempotent patch engine and link rewriter.
//!
//! A [`PatchSet`] applies an ordered list of [`PatchRule`]s to a document.
//! Every rule has a guard ([`PatchRule::is_applied`]); a satisfied guard makes
//! the rule a no-op, and applying the rule satisfies its guard. Running the
//! same set twice therefore gives the same text as running it once.
//!
//! [`LinkRemap`] rewrites path prefixes in a single pass. It is kept apart
//! from the rule set because a remap like `/07/ → /06/, /10/ → /07/` is not
//! idempotent: running it again would shift the already-moved links.

pub mod engine;
pub mod links;
pub mod rules;

pub use engine::{PatchOutcome, PatchRule, PatchSet, RuleOutcome, RuleStatus};
pub use links::{LinkRemap, Relinked};
