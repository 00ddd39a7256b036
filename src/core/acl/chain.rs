//! The block chain: first matching block wins

use super::block::{Block, BlockExitResult, Policy};
use super::context::RequestContext;
use super::rule::RuleRegistry;
use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Declarative form of a block: rule keys with their parameter values, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub name: String,
    pub policy: Policy,
    pub rules: Vec<(String, Vec<String>)>,
}

impl BlockDescriptor {
    pub fn new(name: impl Into<String>, policy: Policy) -> Self {
        BlockDescriptor {
            name: name.into(),
            policy,
            rules: Vec::new(),
        }
    }

    /// Append a rule declaration
    pub fn rule<I, S>(mut self, key: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules
            .push((key.into(), params.into_iter().map(Into::into).collect()));
        self
    }
}

/// Ordered list of blocks
///
/// Immutable once built; evaluation only reads it, so one instance can serve any
/// number of concurrent calls.
#[derive(Debug)]
pub struct Acl {
    blocks: Vec<Block>,
    basic_auth_configured: bool,
}

impl Acl {
    pub fn new(blocks: Vec<Block>) -> Self {
        let basic_auth_configured = blocks.iter().any(Block::has_credential_rule);
        Acl {
            blocks,
            basic_auth_configured,
        }
    }

    /// Build the chain from block descriptors
    ///
    /// A rule reporting `RuleNotConfigured` is logged once and left out. Leaving a
    /// rule out of an ALLOW block would widen it, so such a block is left out whole.
    ///
    /// # Errors
    ///
    /// `UnknownRule`, `InvalidRuleParameter` and `InvalidPattern` abort construction.
    pub fn build(descriptors: &[BlockDescriptor], registry: &RuleRegistry) -> Result<Self> {
        let mut blocks = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let mut rules = Vec::with_capacity(descriptor.rules.len());
            let mut misconfigured = false;

            for (key, params) in &descriptor.rules {
                match registry.build(key, params) {
                    Ok(rule) => rules.push(rule),
                    Err(e @ GateError::RuleNotConfigured { .. }) => {
                        warn!("block {:?}: {}; rule excluded", descriptor.name, e);
                        misconfigured = true;
                    }
                    Err(e) => return Err(e),
                }
            }

            if misconfigured && descriptor.policy == Policy::Allow {
                warn!(
                    "block {:?}: excluded from the chain because of a misconfigured rule",
                    descriptor.name
                );
                continue;
            }

            let block = Block::new(descriptor.name.clone(), descriptor.policy, rules);
            info!("ACL block added: {}", block);
            blocks.push(block);
        }

        Ok(Acl::new(blocks))
    }

    /// Return the first block whose rules all match
    ///
    /// Rewrites made by a block that does not match are undone before the next
    /// block runs, so only the matching block's narrowing survives.
    pub fn check(&self, ctx: &mut RequestContext<'_>) -> BlockExitResult<'_> {
        for block in &self.blocks {
            let checkpoint = ctx.checkpoint();
            if block.check(ctx) {
                debug!("request {} matched block {:?}", ctx, block.name());
                return BlockExitResult::matched(block);
            }
            ctx.restore(checkpoint);
        }
        debug!("request {} matched no block", ctx);
        BlockExitResult::no_match()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Whether any active block carries a credential rule
    pub fn is_basic_auth_configured(&self) -> bool {
        self.basic_auth_configured
    }
}
