//! # Indexgate - Index-level Authorization for Data-serving APIs
//!
//! `indexgate` decides, for every externally-facing call, whether it may proceed and
//! which indices it may touch:
//!
//! - **Ordered blocks** of rules joined by AND; the first block that matches decides
//! - **ALLOW / FORBID** policies, failing closed when nothing matches
//! - **Index narrowing**: searches are rewritten to the permitted indices
//! - **Basic credentials** checked before the chain runs
//!
//! ## Quick Start
//!
//! ```rust
//! use indexgate::{
//!     ActionRequest, BufferedChannel, Gatekeeper, InMemoryCatalog, Inbound, Result, Settings,
//! };
//!
//! # fn main() -> Result<()> {
//! let settings = Settings::from_toml_str(
//!     r#"
//!     [[users]]
//!     name = "admin"
//!     auth_key = "admin:secret"
//!
//!     [[access_control_rules]]
//!     name = "log readers"
//!     type = "allow"
//!     indices = ["logs-*"]
//!     "#,
//! )?;
//! let keeper = Gatekeeper::from_settings(&settings)?;
//! let catalog = InMemoryCatalog::new(["logs-2020", "secret"]);
//!
//! let request = http::Request::builder()
//!     .uri("/_search")
//!     .header("Authorization", "Basic YWRtaW46c2VjcmV0")
//!     .body(())
//!     .unwrap();
//! let mut channel = BufferedChannel::new();
//! let mut search = ActionRequest::search(["logs-2020", "secret"]);
//!
//! let outcome = keeper.handle(
//!     "indices:data/read/search",
//!     &mut search,
//!     Inbound::rest(&request, &mut channel),
//!     &catalog,
//! )?;
//!
//! assert!(outcome.is_allowed());
//! assert_eq!(search.indices.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{acl, audit, config, credentials, error, gate};

pub use crate::core::{
    acl::{
        Acl, ActionKind, ActionRequest, Block, BlockDescriptor, BlockExitResult, InMemoryCatalog,
        IndexCatalog, Matcher, Policy, RequestContext, RequestView, Rule, RuleExitResult,
        RuleRegistry,
    },
    audit::{AuditEntry, AuditLogger, Verdict},
    config::{BlockSettings, Settings, UserSettings},
    credentials::{AuthenticationFailure, CredentialFilter},
    error::{GateError, Result},
    gate::{
        AuthorizationGate, BufferedChannel, GateOutcome, Gatekeeper, Inbound, ResponseChannel,
    },
};
