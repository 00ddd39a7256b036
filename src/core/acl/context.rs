//! Per-request evaluation state and the collaborator traits it reads from

use http::Request;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How an action addresses its target indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Pattern-bearing requests (searches): names may contain wildcards and are
    /// expanded against the catalog
    Search,
    /// Requests naming a fixed list of indices, each checked on its own
    FixedList,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Search => write!(f, "search"),
            ActionKind::FixedList => write!(f, "fixed-list"),
        }
    }
}

/// Live view of the indices (and aliases) that exist
pub trait IndexCatalog {
    /// Whether `name` is an existing index or alias
    fn exists(&self, name: &str) -> bool {
        self.list_all().contains(name)
    }

    /// All index and alias names
    fn list_all(&self) -> BTreeSet<String>;
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    indices: BTreeSet<String>,
    aliases: BTreeSet<String>,
}

impl InMemoryCatalog {
    pub fn new<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InMemoryCatalog {
            indices: indices.into_iter().map(Into::into).collect(),
            aliases: BTreeSet::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn add_index(&mut self, name: impl Into<String>) {
        self.indices.insert(name.into());
    }
}

impl IndexCatalog for InMemoryCatalog {
    fn exists(&self, name: &str) -> bool {
        self.indices.contains(name) || self.aliases.contains(name)
    }

    fn list_all(&self) -> BTreeSet<String> {
        self.indices.union(&self.aliases).cloned().collect()
    }
}

/// The part of an inbound action the engine reads and rewrites
pub trait RequestView {
    fn requested_indices(&self) -> BTreeSet<String>;

    fn set_requested_indices(&mut self, indices: BTreeSet<String>);

    fn action_kind(&self) -> ActionKind;
}

/// Plain action request carrying its kind and target indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub indices: BTreeSet<String>,
}

impl ActionRequest {
    pub fn new<I, S>(kind: ActionKind, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ActionRequest {
            kind,
            indices: indices.into_iter().map(Into::into).collect(),
        }
    }

    pub fn search<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ActionKind::Search, indices)
    }

    pub fn fixed_list<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ActionKind::FixedList, indices)
    }
}

impl RequestView for ActionRequest {
    fn requested_indices(&self) -> BTreeSet<String> {
        self.indices.clone()
    }

    fn set_requested_indices(&mut self, indices: BTreeSet<String>) {
        self.indices = indices;
    }

    fn action_kind(&self) -> ActionKind {
        self.kind
    }
}

/// Mutable state threaded through one call's rule evaluation
///
/// Owned by exactly one evaluation. The catalog snapshot is taken when the context
/// is created and stays fixed for the rest of the call.
pub struct RequestContext<'a> {
    action: &'a str,
    kind: ActionKind,
    indices: BTreeSet<String>,
    rewritten: bool,
    available: BTreeSet<String>,
    request: Option<&'a Request<()>>,
}

/// Requested indices as they stood before a block ran
#[derive(Debug, Clone)]
pub(crate) struct IndicesCheckpoint {
    indices: BTreeSet<String>,
    rewritten: bool,
}

impl<'a> RequestContext<'a> {
    pub fn new(
        action: &'a str,
        kind: ActionKind,
        indices: BTreeSet<String>,
        catalog: &dyn IndexCatalog,
    ) -> Self {
        RequestContext {
            action,
            kind,
            indices,
            rewritten: false,
            available: catalog.list_all(),
            request: None,
        }
    }

    /// Build a context from a request view
    pub fn from_view<V: RequestView + ?Sized>(
        action: &'a str,
        view: &V,
        catalog: &dyn IndexCatalog,
    ) -> Self {
        Self::new(action, view.action_kind(), view.requested_indices(), catalog)
    }

    /// Attach the inbound request head (read by credential rules)
    pub fn with_request(mut self, request: &'a Request<()>) -> Self {
        self.request = Some(request);
        self
    }

    pub fn action(&self) -> &str {
        self.action
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn indices(&self) -> &BTreeSet<String> {
        &self.indices
    }

    /// Replace the requested index set
    pub fn set_indices(&mut self, indices: BTreeSet<String>) {
        self.indices = indices;
        self.rewritten = true;
    }

    /// Whether any rule replaced the requested index set
    pub fn indices_rewritten(&self) -> bool {
        self.rewritten
    }

    pub fn into_indices(self) -> BTreeSet<String> {
        self.indices
    }

    pub(crate) fn checkpoint(&self) -> IndicesCheckpoint {
        IndicesCheckpoint {
            indices: self.indices.clone(),
            rewritten: self.rewritten,
        }
    }

    /// Undo every rewrite made since `checkpoint` was taken
    pub(crate) fn restore(&mut self, checkpoint: IndicesCheckpoint) {
        self.indices = checkpoint.indices;
        self.rewritten = checkpoint.rewritten;
    }

    /// Snapshot of every existing index and alias, taken at call start
    pub fn available_indices(&self) -> &BTreeSet<String> {
        &self.available
    }

    pub fn index_exists(&self, name: &str) -> bool {
        self.available_indices().contains(name)
    }

    pub fn request(&self) -> Option<&Request<()>> {
        self.request
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request?.headers().get(name)?.to_str().ok()
    }
}

impl fmt::Display for RequestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ action: {}, kind: {}, indices: {:?}",
            self.action, self.kind, self.indices
        )?;
        if let Some(request) = self.request {
            write!(f, ", method: {}, uri: {}", request.method(), request.uri())?;
        }
        write!(f, " }}")
    }
}
