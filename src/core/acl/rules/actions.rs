//! Action-name rule

use crate::acl::context::RequestContext;
use crate::acl::matcher::Matcher;
use crate::acl::rule::{require_values, Rule, RuleExitResult};
use crate::error::Result;

/// Matches when the action name matches one of the configured patterns
#[derive(Debug)]
pub struct ActionsRule {
    configured: Matcher,
}

impl ActionsRule {
    pub const KEY: &'static str = "actions";

    pub fn new(params: &[String]) -> Result<Self> {
        let configured = Matcher::new(require_values(Self::KEY, params)?)?;
        Ok(ActionsRule { configured })
    }
}

impl Rule for ActionsRule {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    fn evaluate(&self, ctx: &mut RequestContext<'_>) -> RuleExitResult {
        if self.configured.matches(ctx.action()) {
            RuleExitResult::Match
        } else {
            RuleExitResult::NoMatch
        }
    }
}
