//! Integration tests for the access control list

use super::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(["logs-2020", "logs-2021", "other", "secret"])
}

fn build(descriptors: Vec<BlockDescriptor>) -> Acl {
    Acl::build(&descriptors, &RuleRegistry::default()).unwrap()
}

/// Evaluate and return (allowed, matched block name, indices after evaluation)
fn run(
    acl: &Acl,
    action: &str,
    request: &ActionRequest,
    catalog: &InMemoryCatalog,
) -> (bool, Option<String>, BTreeSet<String>) {
    let mut ctx = RequestContext::from_view(action, request, catalog);
    let exit = acl.check(&mut ctx);
    let block = exit.block().map(|b| b.name().to_string());
    (exit.is_allowed(), block, ctx.into_indices())
}

#[test]
fn test_log_reader_scenarios() {
    let acl = build(vec![
        BlockDescriptor::new("log readers", Policy::Allow).rule("indices", ["logs-*"])
    ]);
    let catalog = catalog();

    // Nothing requested: rewritten to the configured patterns
    let (allowed, _, indices) = run(
        &acl,
        "search",
        &ActionRequest::search(Vec::<String>::new()),
        &catalog,
    );
    assert!(allowed);
    assert_eq!(indices, set(&["logs-*"]));

    // Mixed request: narrowed to the permitted part
    let (allowed, _, indices) = run(
        &acl,
        "search",
        &ActionRequest::search(["logs-2020", "other"]),
        &catalog,
    );
    assert!(allowed);
    assert_eq!(indices, set(&["logs-2020"]));

    // Unknown index: deferred to not-found handling
    let (allowed, _, indices) = run(
        &acl,
        "search",
        &ActionRequest::search(["missing-idx"]),
        &catalog,
    );
    assert!(allowed);
    assert_eq!(indices, set(&["missing-idx"]));

    // Only forbidden indices: no block matches
    let (allowed, block, _) = run(&acl, "search", &ActionRequest::search(["secret"]), &catalog);
    assert!(!allowed);
    assert_eq!(block, None);
}

#[test]
fn test_forbid_then_allow() {
    let acl = build(vec![
        BlockDescriptor::new("no deletes", Policy::Forbid)
            .rule("actions", ["indices:admin/delete"]),
        BlockDescriptor::new("everything", Policy::Allow).rule("indices", ["*"]),
    ]);
    let catalog = catalog();
    let request = ActionRequest::fixed_list(["logs-2020"]);

    let (allowed, block, _) = run(&acl, "indices:admin/delete", &request, &catalog);
    assert!(!allowed);
    assert_eq!(block.as_deref(), Some("no deletes"));

    let (allowed, block, _) = run(&acl, "indices:data/read/get", &request, &catalog);
    assert!(allowed);
    assert_eq!(block.as_deref(), Some("everything"));
}

#[test]
fn test_rule_order_within_block() {
    // Actions rule first: a non-matching action stops before the indices rule
    // gets a chance to rewrite anything
    let acl = build(vec![BlockDescriptor::new("readers", Policy::Allow)
        .rule("actions", ["indices:data/read/*"])
        .rule("indices", ["logs-*"])]);
    let catalog = catalog();
    let request = ActionRequest::search(["logs-2020", "other"]);

    let (allowed, _, indices) = run(&acl, "indices:data/write/bulk", &request, &catalog);
    assert!(!allowed);
    assert_eq!(indices, set(&["logs-2020", "other"]));

    let (allowed, _, indices) = run(&acl, "indices:data/read/search", &request, &catalog);
    assert!(allowed);
    assert_eq!(indices, set(&["logs-2020"]));
}

#[test]
fn test_failed_block_does_not_narrow_later_blocks() {
    // The first block narrows to logs-1 before its actions rule fails; the second
    // block must see the original request
    let acl = build(vec![
        BlockDescriptor::new("logs for one action", Policy::Allow)
            .rule("indices", ["logs-*"])
            .rule("actions", ["nope"]),
        BlockDescriptor::new("other", Policy::Allow).rule("indices", ["other"]),
    ]);
    let catalog = InMemoryCatalog::new(["logs-1", "other"]);

    let (allowed, block, indices) = run(
        &acl,
        "indices:data/read/search",
        &ActionRequest::search(["logs-1", "other"]),
        &catalog,
    );
    assert!(allowed);
    assert_eq!(block.as_deref(), Some("other"));
    assert_eq!(indices, set(&["other"]));
}

#[test]
fn test_no_match_leaves_request_untouched() {
    let acl = build(vec![BlockDescriptor::new("logs for one action", Policy::Allow)
        .rule("indices", ["logs-*"])
        .rule("actions", ["nope"])]);
    let catalog = InMemoryCatalog::new(["logs-1", "other"]);

    let (allowed, block, indices) = run(
        &acl,
        "indices:data/read/search",
        &ActionRequest::search(["logs-1", "other"]),
        &catalog,
    );
    assert!(!allowed);
    assert_eq!(block, None);
    assert_eq!(indices, set(&["logs-1", "other"]));
}

#[test]
fn test_fixed_list_no_index_sentinel() {
    let acl = build(vec![BlockDescriptor::new("cluster reads", Policy::Allow)
        .rule("indices", ["logs-*", "<no-index>"])]);
    let catalog = catalog();

    let (allowed, _, _) = run(
        &acl,
        "cluster:monitor/health",
        &ActionRequest::fixed_list(Vec::<String>::new()),
        &catalog,
    );
    assert!(allowed);

    let (allowed, _, _) = run(
        &acl,
        "indices:data/read/get",
        &ActionRequest::fixed_list(["x"]),
        &catalog,
    );
    assert!(!allowed);
}

#[test]
fn test_containment_semantics_widen_patterns() {
    // `log*` is searched for anywhere in the name, so `catalog-logs` is covered too
    let acl = build(vec![
        BlockDescriptor::new("logs", Policy::Allow).rule("indices", ["log*"])
    ]);
    let catalog = InMemoryCatalog::new(["logs-2020", "catalog-logs", "metrics"]);

    let (allowed, _, indices) = run(&acl, "search", &ActionRequest::search(["*"]), &catalog);
    assert!(allowed);
    assert_eq!(indices, set(&["catalog-logs", "logs-2020"]));
}

#[test]
fn test_exclusion_patterns_are_dropped() {
    let acl = build(vec![BlockDescriptor::new("logs", Policy::Allow)
        .rule("indices", ["logs-*", "-logs-2020"])]);
    let catalog = catalog();

    // The exclusion is ignored rather than enforced
    let (allowed, _, indices) = run(
        &acl,
        "search",
        &ActionRequest::search(["logs-2020"]),
        &catalog,
    );
    assert!(allowed);
    assert_eq!(indices, set(&["logs-2020"]));
}

#[test]
fn test_concurrent_evaluation_is_deterministic() {
    let acl = Arc::new(build(vec![
        BlockDescriptor::new("no writes", Policy::Forbid).rule("actions", ["*write*"]),
        BlockDescriptor::new("logs", Policy::Allow).rule("indices", ["logs-*"]),
    ]));
    let catalog = Arc::new(catalog());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let acl = Arc::clone(&acl);
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || {
                (0..200)
                    .map(|_| {
                        let request = ActionRequest::search(["logs-2020", "other"]);
                        run(&acl, "indices:data/read/search", &request, &catalog)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let expected = (true, Some("logs".to_string()), set(&["logs-2020"]));
    for handle in handles {
        for result in handle.join().unwrap() {
            assert_eq!(result, expected);
        }
    }
}
