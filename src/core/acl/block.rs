//! Blocks: ordered AND-chains of rules with a terminal policy

use super::context::RequestContext;
use super::rule::Rule;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// What happens when every rule of a block matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Let the request through
    #[default]
    Allow,
    /// Reject the request
    Forbid,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Allow => write!(f, "ALLOW"),
            Policy::Forbid => write!(f, "FORBID"),
        }
    }
}

/// A named, ordered list of rules
#[derive(Debug)]
pub struct Block {
    name: String,
    policy: Policy,
    rules: Vec<Box<dyn Rule>>,
}

impl Block {
    pub fn new(name: impl Into<String>, policy: Policy, rules: Vec<Box<dyn Rule>>) -> Self {
        Block {
            name: name.into(),
            policy,
            rules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn has_credential_rule(&self) -> bool {
        self.rules.iter().any(|rule| rule.is_credential_rule())
    }

    /// Evaluate rules left to right, stopping at the first that does not match
    ///
    /// Rules after a failing one never run, so they cannot touch the context.
    pub fn check(&self, ctx: &mut RequestContext<'_>) -> bool {
        for rule in &self.rules {
            if !rule.evaluate(ctx).is_match() {
                debug!("block {:?}: rule {} did not match", self.name, rule.key());
                return false;
            }
        }
        debug!("block {:?}: all {} rules matched", self.name, self.rules.len());
        true
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.rules.iter().map(|r| r.key()).collect();
        write!(f, "{{ name: {:?}, policy: {}, rules: {:?} }}", self.name, self.policy, keys)
    }
}

/// Terminal outcome of chain evaluation
#[derive(Debug, Clone, Copy)]
pub struct BlockExitResult<'a> {
    pub matched: bool,
    pub block: Option<&'a Block>,
}

impl<'a> BlockExitResult<'a> {
    pub fn matched(block: &'a Block) -> Self {
        BlockExitResult {
            matched: true,
            block: Some(block),
        }
    }

    pub fn no_match() -> Self {
        BlockExitResult {
            matched: false,
            block: None,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched
    }

    pub fn block(&self) -> Option<&'a Block> {
        self.block
    }

    /// Only a matched ALLOW block lets a request through
    pub fn is_allowed(&self) -> bool {
        match self.block {
            Some(block) => self.matched && block.policy() == Policy::Allow,
            None => false,
        }
    }
}

impl fmt::Display for BlockExitResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.matched, self.block) {
            (true, Some(block)) => write!(f, "matched {}", block),
            _ => write!(f, "no block matched"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::context::{ActionKind, InMemoryCatalog};
    use crate::acl::rule::RuleExitResult;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Counting {
        result: RuleExitResult,
        calls: Arc<AtomicUsize>,
    }

    impl Rule for Counting {
        fn key(&self) -> &'static str {
            "counting"
        }

        fn evaluate(&self, _ctx: &mut RequestContext<'_>) -> RuleExitResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
        }
    }

    #[derive(Debug)]
    struct Rewrite(&'static str);

    impl Rule for Rewrite {
        fn key(&self) -> &'static str {
            "rewrite"
        }

        fn evaluate(&self, ctx: &mut RequestContext<'_>) -> RuleExitResult {
            ctx.set_indices(BTreeSet::from([self.0.to_string()]));
            RuleExitResult::Match
        }
    }

    #[derive(Debug)]
    struct RequireIndex(&'static str);

    impl Rule for RequireIndex {
        fn key(&self) -> &'static str {
            "require"
        }

        fn evaluate(&self, ctx: &mut RequestContext<'_>) -> RuleExitResult {
            if ctx.indices().contains(self.0) {
                RuleExitResult::Match
            } else {
                RuleExitResult::NoMatch
            }
        }
    }

    #[test]
    fn test_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let block = Block::new(
            "short",
            Policy::Allow,
            vec![
                Box::new(Counting {
                    result: RuleExitResult::NoMatch,
                    calls: Arc::clone(&calls),
                }),
                Box::new(Counting {
                    result: RuleExitResult::Match,
                    calls: Arc::clone(&calls),
                }),
            ],
        );
        let catalog = InMemoryCatalog::default();
        let mut ctx = RequestContext::new("search", ActionKind::Search, BTreeSet::new(), &catalog);

        assert!(!block.check(&mut ctx));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_later_rules_see_earlier_rewrites() {
        let block = Block::new(
            "ordered",
            Policy::Allow,
            vec![Box::new(Rewrite("narrowed")), Box::new(RequireIndex("narrowed"))],
        );
        let catalog = InMemoryCatalog::default();
        let mut ctx = RequestContext::new("search", ActionKind::Search, BTreeSet::new(), &catalog);

        assert!(block.check(&mut ctx));

        let reversed = Block::new(
            "reversed",
            Policy::Allow,
            vec![Box::new(RequireIndex("narrowed")), Box::new(Rewrite("narrowed"))],
        );
        let mut ctx = RequestContext::new("search", ActionKind::Search, BTreeSet::new(), &catalog);
        assert!(!reversed.check(&mut ctx));
        assert!(!ctx.indices_rewritten());
    }

    #[test]
    fn test_empty_block_matches() {
        let block = Block::new("open", Policy::Allow, Vec::new());
        let catalog = InMemoryCatalog::default();
        let mut ctx = RequestContext::new("search", ActionKind::Search, BTreeSet::new(), &catalog);
        assert!(block.check(&mut ctx));
    }

    #[test]
    fn test_exit_result_allowed() {
        let allow = Block::new("a", Policy::Allow, Vec::new());
        let forbid = Block::new("f", Policy::Forbid, Vec::new());

        assert!(BlockExitResult::matched(&allow).is_allowed());
        assert!(!BlockExitResult::matched(&forbid).is_allowed());
        assert!(!BlockExitResult::no_match().is_allowed());
        assert_eq!(BlockExitResult::no_match().to_string(), "no block matched");
    }
}
