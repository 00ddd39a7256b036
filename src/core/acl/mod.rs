//! Access control list for index-level authorization
//!
//! Provides ordered, first-match-wins evaluation with:
//! - Blocks of rules joined by AND, evaluated in declaration order
//! - ALLOW and FORBID policies, failing closed when no block matches
//! - Unanchored wildcard matching for index, action and credential patterns
//! - Narrowing of search requests to the permitted indices

mod block;
mod chain;
mod context;
pub mod matcher;
mod rule;
pub mod rules;

pub use block::{Block, BlockExitResult, Policy};
pub use chain::{Acl, BlockDescriptor};
pub use context::{
    ActionKind, ActionRequest, InMemoryCatalog, IndexCatalog, RequestContext, RequestView,
};
pub use matcher::Matcher;
pub use rule::{Rule, RuleConstructor, RuleExitResult, RuleRegistry};

#[cfg(test)]
mod tests;
