//! HTTP Basic credential pre-filter
//!
//! Runs before the block chain. A request must carry `Authorization: Basic <token>`
//! where the token equals the base64 form of one configured user's `auth_key`.

use crate::config::UserSettings;
use base64::{engine::general_purpose::STANDARD, Engine};
use http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{Request, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, error};

/// Challenge sent with every authentication failure
pub const BASIC_CHALLENGE: &str = "Basic realm=\"shield\" charset=\"UTF-8\"";

const BASIC_SCHEME: &str = "Basic ";

/// Why a request failed authentication
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationFailure {
    #[error("missing authentication token for REST request [{uri}]")]
    MissingToken { uri: String },

    #[error("unable to authenticate user [{user}] for REST request [{uri}]")]
    InvalidCredentials { user: String, uri: String },
}

impl AuthenticationFailure {
    /// 401 response carrying the Basic challenge
    pub fn into_response(self) -> Response<String> {
        let body = serde_json::json!({ "error_message": self.to_string() }).to_string();

        Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header(WWW_AUTHENTICATE, BASIC_CHALLENGE)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap_or_else(|e| {
                error!("failed to build authentication challenge: {}", e);
                let mut response = Response::new(String::new());
                *response.status_mut() = StatusCode::UNAUTHORIZED;
                response
            })
    }
}

/// Extract the token following the `Basic` scheme
///
/// Returns `None` when the scheme is absent or the token is blank.
pub fn basic_token(header: &str) -> Option<&str> {
    let (_, token) = header.split_once(BASIC_SCHEME)?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Base64 form of a `user:password` pair, as a client puts it on the wire
pub fn encode_credentials(plain: &str) -> String {
    STANDARD.encode(plain.as_bytes())
}

/// User name inside a Basic token, for logging only
fn token_user(token: &str) -> Option<String> {
    let decoded = STANDARD.decode(token).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    decoded.split(':').next().map(str::to_string)
}

/// Checks inbound requests against the configured users
#[derive(Clone)]
pub struct CredentialFilter {
    /// Base64 credentials of every user with a non-blank key
    encoded: Vec<String>,
}

impl CredentialFilter {
    pub fn new(users: &[UserSettings]) -> Self {
        let encoded = users
            .iter()
            .map(|user| user.auth_key.trim())
            .filter(|key| !key.is_empty())
            .map(encode_credentials)
            .collect();
        CredentialFilter { encoded }
    }

    /// Number of users able to authenticate
    pub fn user_count(&self) -> usize {
        self.encoded.len()
    }

    /// Let the request through only if it presents a configured credential
    pub fn authenticate<B>(&self, request: &Request<B>) -> Result<(), AuthenticationFailure> {
        let uri = request.uri().to_string();
        let token = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(basic_token)
            .ok_or_else(|| AuthenticationFailure::MissingToken { uri: uri.clone() })?;

        let user = token_user(token).unwrap_or_default();
        debug!("login as: {:?} request: {}", user, uri);

        if self.encoded.iter().any(|key| key == token) {
            Ok(())
        } else {
            Err(AuthenticationFailure::InvalidCredentials { user, uri })
        }
    }
}

impl std::fmt::Debug for CredentialFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialFilter")
            .field("users", &self.encoded.len())
            .finish()
    }
}
