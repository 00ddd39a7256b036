//! Authorization gate: turns a chain decision into pass or rejection
//!
//! Every externally-facing call carries both a request head and a response
//! channel. Calls carrying neither are internal and pass untouched. Calls carrying
//! exactly one mean the integration is miswired, which is a fatal error.

use crate::acl::{Acl, BlockExitResult, IndexCatalog, RequestContext, RequestView, RuleRegistry};
use crate::audit::{AuditEntry, AuditLogger};
use crate::config::Settings;
use crate::credentials::{AuthenticationFailure, CredentialFilter};
use crate::error::{GateError, Result};
use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where rejections are written
pub trait ResponseChannel {
    fn send_response(&mut self, response: Response<String>);
}

/// Channel that keeps every response it is given
#[derive(Debug, Default)]
pub struct BufferedChannel {
    responses: Vec<Response<String>>,
}

impl BufferedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(&self) -> &[Response<String>] {
        &self.responses
    }

    pub fn last(&self) -> Option<&Response<String>> {
        self.responses.last()
    }
}

impl ResponseChannel for BufferedChannel {
    fn send_response(&mut self, response: Response<String>) {
        self.responses.push(response);
    }
}

/// Transport handles attached to a call
pub struct Inbound<'a> {
    pub request: Option<&'a Request<()>>,
    pub channel: Option<&'a mut dyn ResponseChannel>,
}

impl<'a> Inbound<'a> {
    /// A call with no transport handles
    pub fn internal() -> Self {
        Inbound {
            request: None,
            channel: None,
        }
    }

    /// A call received over REST
    pub fn rest(request: &'a Request<()>, channel: &'a mut dyn ResponseChannel) -> Self {
        Inbound {
            request: Some(request),
            channel: Some(channel),
        }
    }

    /// Split into a request/channel pair
    ///
    /// `Ok(None)` for internal calls; `SecurityPermission` when only one half is present.
    fn paired(self) -> Result<Option<(&'a Request<()>, &'a mut dyn ResponseChannel)>> {
        match (self.request, self.channel) {
            (None, None) => Ok(None),
            (Some(request), Some(channel)) => Ok(Some((request, channel))),
            (Some(_), None) => Err(GateError::SecurityPermission(
                "Problems analyzing the channel object. Have you checked the security permissions?"
                    .to_string(),
            )),
            (None, Some(_)) => Err(GateError::SecurityPermission(
                "Problems analyzing the request object. Have you checked the security permissions?"
                    .to_string(),
            )),
        }
    }
}

/// What the gate did with a call
#[derive(Debug)]
pub enum GateOutcome<'a> {
    /// Not evaluated: gate disabled or internal call
    PassThrough,
    /// A matching ALLOW block let the call through
    Allowed(BlockExitResult<'a>),
    /// Rejected with `status`; the response was sent on the channel
    Rejected {
        exit: BlockExitResult<'a>,
        status: StatusCode,
    },
    /// Stopped by the credential pre-filter before the chain ran
    Unauthenticated(AuthenticationFailure),
}

impl GateOutcome<'_> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateOutcome::PassThrough | GateOutcome::Allowed(_))
    }
}

/// Runs the block chain for each externally-facing call
#[derive(Debug)]
pub struct AuthorizationGate {
    acl: Acl,
    enabled: bool,
    forbidden_response: String,
    audit: Option<Arc<AuditLogger>>,
}

impl AuthorizationGate {
    pub fn new(acl: Acl, forbidden_response: impl Into<String>) -> Self {
        AuthorizationGate {
            acl,
            enabled: true,
            forbidden_response: forbidden_response.into(),
            audit: None,
        }
    }

    /// Build the gate and its chain from settings
    pub fn from_settings(settings: &Settings, registry: &RuleRegistry) -> Result<Self> {
        let acl = Acl::build(&settings.block_descriptors()?, registry)?;
        let mut gate = AuthorizationGate::new(acl, settings.forbidden_response.clone());
        gate.enabled = settings.enabled;

        if gate.enabled {
            info!("authorization gate enabled with {} blocks", gate.acl.blocks().len());
        } else {
            info!("authorization gate is disabled, block chain will not run");
        }
        Ok(gate)
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn acl(&self) -> &Acl {
        &self.acl
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide on one call
    ///
    /// On ALLOW any narrowing of the requested indices is written back to `view`.
    /// On rejection the response goes out on the inbound channel.
    ///
    /// # Errors
    ///
    /// `SecurityPermission` if exactly one of request and channel is attached.
    pub fn apply<V: RequestView + ?Sized>(
        &self,
        action: &str,
        view: &mut V,
        inbound: Inbound<'_>,
        catalog: &dyn IndexCatalog,
    ) -> Result<GateOutcome<'_>> {
        if !self.enabled {
            return Ok(GateOutcome::PassThrough);
        }

        match inbound.paired()? {
            None => Ok(GateOutcome::PassThrough),
            Some((request, channel)) => Ok(self.evaluate(action, view, request, channel, catalog)),
        }
    }

    fn evaluate<V: RequestView + ?Sized>(
        &self,
        action: &str,
        view: &mut V,
        request: &Request<()>,
        channel: &mut dyn ResponseChannel,
        catalog: &dyn IndexCatalog,
    ) -> GateOutcome<'_> {
        let mut ctx = RequestContext::from_view(action, &*view, catalog).with_request(request);
        let exit = self.acl.check(&mut ctx);

        if let Some(audit) = &self.audit {
            audit.log(AuditEntry::from_exit(action, ctx.indices(), &exit));
        }

        if exit.is_allowed() {
            if ctx.indices_rewritten() {
                view.set_requested_indices(ctx.into_indices());
            }
            return GateOutcome::Allowed(exit);
        }

        info!("forbidden request: {} reason: {}", ctx, exit);
        let response = self.rejection();
        let status = response.status();
        channel.send_response(response);

        GateOutcome::Rejected { exit, status }
    }

    /// Rejection response: 401 with a Basic challenge when credentials are in play,
    /// 403 otherwise
    pub fn rejection(&self) -> Response<String> {
        let challenge = self.acl.is_basic_auth_configured();
        let status = if challenge {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::FORBIDDEN
        };

        let body = serde_json::to_string(&serde_json::json!({
            "error_message": self.forbidden_response,
        }))
        .unwrap_or_else(|e| {
            error!("construct forbidden reason failed: {}", e);
            String::new()
        });

        let mut builder = Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json");
        if challenge {
            debug!("sending login prompt header");
            builder = builder.header(WWW_AUTHENTICATE, "Basic");
        }

        builder.body(body).unwrap_or_else(|e| {
            error!("construct forbidden response failed: {}", e);
            let mut response = Response::new(String::new());
            *response.status_mut() = status;
            response
        })
    }
}

/// Credential pre-filter in front of the authorization gate
#[derive(Debug)]
pub struct Gatekeeper {
    gate: AuthorizationGate,
    credentials: CredentialFilter,
}

impl Gatekeeper {
    pub fn new(gate: AuthorizationGate, credentials: CredentialFilter) -> Self {
        Gatekeeper { gate, credentials }
    }

    /// Build with the built-in rules
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::with_registry(settings, &RuleRegistry::default())
    }

    pub fn with_registry(settings: &Settings, registry: &RuleRegistry) -> Result<Self> {
        Ok(Gatekeeper {
            gate: AuthorizationGate::from_settings(settings, registry)?,
            credentials: CredentialFilter::new(&settings.users),
        })
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.gate = self.gate.with_audit(audit);
        self
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.gate
    }

    /// Authenticate, then authorize
    ///
    /// A call failing authentication receives the 401 challenge and never reaches
    /// the block chain. Every REST call is authenticated; a disabled gate only skips
    /// the chain.
    pub fn handle<V: RequestView + ?Sized>(
        &self,
        action: &str,
        view: &mut V,
        inbound: Inbound<'_>,
        catalog: &dyn IndexCatalog,
    ) -> Result<GateOutcome<'_>> {
        let Some((request, channel)) = inbound.paired()? else {
            return Ok(GateOutcome::PassThrough);
        };

        if let Err(failure) = self.credentials.authenticate(request) {
            info!("{}", failure);
            channel.send_response(failure.clone().into_response());
            return Ok(GateOutcome::Unauthenticated(failure));
        }

        if !self.gate.is_enabled() {
            return Ok(GateOutcome::PassThrough);
        }

        Ok(self.gate.evaluate(action, view, request, channel, catalog))
    }
}
