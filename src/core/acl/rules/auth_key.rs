//! HTTP Basic credential rule

use crate::acl::context::RequestContext;
use crate::acl::rule::{require_values, Rule, RuleExitResult};
use crate::credentials::{basic_token, encode_credentials};
use crate::error::Result;
use http::header::AUTHORIZATION;
use std::fmt;

/// Matches requests presenting one of the configured `user:password` pairs
pub struct AuthKeyRule {
    /// Base64 form of each configured pair, as sent in the header
    encoded: Vec<String>,
}

impl AuthKeyRule {
    pub const KEY: &'static str = "auth_key";

    pub fn new(params: &[String]) -> Result<Self> {
        let encoded = require_values(Self::KEY, params)?
            .into_iter()
            .map(|plain| encode_credentials(plain.trim()))
            .collect();
        Ok(AuthKeyRule { encoded })
    }
}

impl Rule for AuthKeyRule {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    fn evaluate(&self, ctx: &mut RequestContext<'_>) -> RuleExitResult {
        let Some(token) = ctx.header(AUTHORIZATION.as_str()).and_then(basic_token) else {
            return RuleExitResult::NoMatch;
        };

        if self.encoded.iter().any(|key| key == token) {
            RuleExitResult::Match
        } else {
            RuleExitResult::NoMatch
        }
    }

    fn is_credential_rule(&self) -> bool {
        true
    }
}

impl fmt::Debug for AuthKeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeyRule")
            .field("keys", &self.encoded.len())
            .finish()
    }
}
