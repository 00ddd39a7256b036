//! Rule contract and the registry mapping rule keys to constructors

use super::context::RequestContext;
use super::rules::{ActionsRule, AuthKeyRule, IndicesRule};
use crate::error::{GateError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of evaluating one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleExitResult {
    Match,
    NoMatch,
}

impl RuleExitResult {
    pub fn is_match(self) -> bool {
        self == RuleExitResult::Match
    }
}

/// A capability-tagged predicate over the request context
///
/// Rules are built once from configuration and never change afterwards. `evaluate`
/// may narrow the context's requested indices.
pub trait Rule: fmt::Debug + Send + Sync {
    /// Configuration key this rule is declared under
    fn key(&self) -> &'static str;

    fn evaluate(&self, ctx: &mut RequestContext<'_>) -> RuleExitResult;

    /// Credential rules turn a rejection into a 401 challenge
    fn is_credential_rule(&self) -> bool {
        false
    }
}

/// Builds a rule from its declared parameter values
pub type RuleConstructor = Box<dyn Fn(&[String]) -> Result<Box<dyn Rule>> + Send + Sync>;

/// Maps declarative rule keys to constructors
pub struct RuleRegistry {
    constructors: BTreeMap<String, RuleConstructor>,
}

impl RuleRegistry {
    /// Registry with no rules at all
    pub fn empty() -> Self {
        RuleRegistry {
            constructors: BTreeMap::new(),
        }
    }

    /// Register (or replace) the constructor for `key`
    pub fn register<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&[String]) -> Result<Box<dyn Rule>> + Send + Sync + 'static,
    {
        self.constructors.insert(key.into(), Box::new(constructor));
    }

    /// Construct the rule declared under `key`
    ///
    /// # Errors
    ///
    /// `UnknownRule` if nothing is registered for `key`; otherwise whatever the
    /// constructor reports (typically `RuleNotConfigured`).
    pub fn build(&self, key: &str, params: &[String]) -> Result<Box<dyn Rule>> {
        let constructor = self
            .constructors
            .get(key)
            .ok_or_else(|| GateError::UnknownRule(key.to_string()))?;
        constructor(params)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = RuleRegistry::empty();
        registry.register(IndicesRule::KEY, |params| {
            Ok(Box::new(IndicesRule::new(params)?) as Box<dyn Rule>)
        });
        registry.register(AuthKeyRule::KEY, |params| {
            Ok(Box::new(AuthKeyRule::new(params)?) as Box<dyn Rule>)
        });
        registry.register(ActionsRule::KEY, |params| {
            Ok(Box::new(ActionsRule::new(params)?) as Box<dyn Rule>)
        });
        registry
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}

/// Non-blank parameter values, or `RuleNotConfigured` when there are none
pub(crate) fn require_values<'p>(rule: &str, params: &'p [String]) -> Result<Vec<&'p str>> {
    let values: Vec<&str> = params
        .iter()
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .collect();

    if values.is_empty() {
        return Err(GateError::RuleNotConfigured {
            rule: rule.to_string(),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Always(RuleExitResult);

    impl Rule for Always {
        fn key(&self) -> &'static str {
            "always"
        }

        fn evaluate(&self, _ctx: &mut RequestContext<'_>) -> RuleExitResult {
            self.0
        }
    }

    #[test]
    fn test_default_registry_keys() {
        let registry = RuleRegistry::default();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["actions", "auth_key", "indices"]);
    }

    #[test]
    fn test_unknown_rule() {
        let registry = RuleRegistry::default();
        let err = registry.build("hosts", &["127.0.0.1".to_string()]).unwrap_err();
        assert!(matches!(err, GateError::UnknownRule(ref key) if key == "hosts"));
    }

    #[test]
    fn test_missing_configuration_fails_at_construction() {
        let registry = RuleRegistry::default();
        let err = registry.build("indices", &[]).unwrap_err();
        assert!(matches!(err, GateError::RuleNotConfigured { .. }));

        let err = registry.build("indices", &["  ".to_string()]).unwrap_err();
        assert!(matches!(err, GateError::RuleNotConfigured { .. }));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = RuleRegistry::empty();
        registry.register("always", |_| {
            Ok(Box::new(Always(RuleExitResult::Match)) as Box<dyn Rule>)
        });

        assert!(registry.contains("always"));
        let rule = registry.build("always", &[]).unwrap();
        assert_eq!(rule.key(), "always");
        assert!(!rule.is_credential_rule());
    }
}
