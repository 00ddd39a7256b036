//! Index authorization with narrowing of the requested index set

use crate::acl::context::{ActionKind, RequestContext};
use crate::acl::matcher::Matcher;
use crate::acl::rule::{require_values, Rule, RuleExitResult};
use crate::error::{GateError, Result};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Grants access to the configured index patterns
///
/// For searches the requested set is rewritten to the permitted part of what it
/// resolves to; fixed-list actions must name only permitted indices.
#[derive(Debug)]
pub struct IndicesRule {
    configured: Matcher,
}

impl IndicesRule {
    pub const KEY: &'static str = "indices";

    /// Request for every index
    const ALL: &'static str = "_all";

    /// Sentinel allowing fixed-list actions that name no index at all
    pub const NO_INDEX: &'static str = "<no-index>";

    /// # Errors
    ///
    /// `RuleNotConfigured` if no pattern survives normalization.
    pub fn new(params: &[String]) -> Result<Self> {
        let values = require_values(Self::KEY, params)?;
        let configured = Matcher::new(values)?;

        // A pattern list of only exclusions would otherwise rewrite searches to the
        // empty set, which downstream reads as "everything".
        if configured.is_empty() {
            return Err(GateError::RuleNotConfigured {
                rule: Self::KEY.to_string(),
            });
        }

        Ok(IndicesRule { configured })
    }

    pub fn patterns(&self) -> &BTreeSet<String> {
        self.configured.patterns()
    }

    fn evaluate_search(&self, ctx: &mut RequestContext<'_>) -> RuleExitResult {
        // 1. Nothing or everything requested: narrow to what is permitted
        if ctx.indices().is_empty() || ctx.indices().contains(Self::ALL) {
            debug!("{}: all indices requested, rewriting to {:?}", Self::KEY, self.patterns());
            ctx.set_indices(self.patterns().clone());
            return RuleExitResult::Match;
        }

        // 2. Every requested name is permitted as is
        if self.configured.filter(ctx.indices()).len() == ctx.indices().len() {
            return RuleExitResult::Match;
        }

        // 3. A concrete name that does not exist is left to the not-found path
        let missing = ctx
            .indices()
            .iter()
            .find(|name| !name.contains('*') && !ctx.index_exists(name))
            .cloned();
        if let Some(missing) = missing {
            debug!("{}: {:?} does not exist, deferring to not-found", Self::KEY, missing);
            ctx.set_indices(BTreeSet::from([missing]));
            return RuleExitResult::Match;
        }

        // 4. Resolve the requested names against what exists
        let requested = match Matcher::new(ctx.indices()) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!("{}: cannot expand requested indices: {}", Self::KEY, e);
                return RuleExitResult::NoMatch;
            }
        };
        let expansion = requested.filter(ctx.available_indices());

        // 5. Resolves to nothing on its own
        if expansion.is_empty() {
            return RuleExitResult::Match;
        }

        // 6. Keep only the permitted part of the expansion
        let allowed = self.configured.filter(&expansion);
        if allowed.is_empty() {
            debug!("{}: {:?} expands only to forbidden indices", Self::KEY, ctx.indices());
            return RuleExitResult::NoMatch;
        }

        debug!("{}: narrowing {:?} to {:?}", Self::KEY, ctx.indices(), allowed);
        ctx.set_indices(allowed);
        RuleExitResult::Match
    }

    fn evaluate_fixed_list(&self, ctx: &RequestContext<'_>) -> RuleExitResult {
        if ctx.indices().is_empty() && self.configured.contains_pattern(Self::NO_INDEX) {
            return RuleExitResult::Match;
        }

        if ctx.indices().iter().all(|name| self.configured.matches(name)) {
            RuleExitResult::Match
        } else {
            RuleExitResult::NoMatch
        }
    }
}

impl Rule for IndicesRule {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    fn evaluate(&self, ctx: &mut RequestContext<'_>) -> RuleExitResult {
        match ctx.kind() {
            ActionKind::Search => self.evaluate_search(ctx),
            ActionKind::FixedList => self.evaluate_fixed_list(ctx),
        }
    }
}
