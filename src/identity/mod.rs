//! Identity service: provider-neutral types and the client seam.
//!
//! DESIGN
//! ======
//! The identity service owns accounts, credentials and session tokens. This
//! module exposes it through the [`IdentityProvider`] trait so the gateway,
//! the route guard and tests can swap the real HTTP client ([`GoTrueClient`])
//! for a mock. Nothing here interprets errors for end users; that is the
//! gateway's job.

pub mod gotrue;
pub mod pkce;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use gotrue::GoTrueClient;

// =============================================================================
// TYPES
// =============================================================================

/// Read-only view of the external user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Arbitrary user metadata as stored by the identity service.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Tokens issued by the identity service for one authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// An established session: tokens plus the identity they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub tokens: AuthTokens,
    pub identity: Identity,
}

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity service calls.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The HTTP request could not be sent or timed out.
    #[error("identity request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("identity service error: status {status}: {message}")]
    Api {
        status: u16,
        /// Machine-readable code (`error_code` / `error`) when the service sent one.
        code: Option<String>,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected identity response: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl IdentityError {
    /// HTTP status of an API rejection, if this is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` for 4xx answers: the service understood and refused the request.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self.status(), Some(400..=499))
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Operations the application needs from the identity service.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. Returns the new user when the service discloses it.
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Option<Identity>, IdentityError>;

    /// Exchange email + password for a session.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    /// Build the URL that starts an external OAuth flow (PKCE, S256).
    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> Result<String, IdentityError>;

    /// Exchange the authorization code returned to the callback for a session.
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<AuthSession, IdentityError>;

    /// Resolve the user behind an access token. `Ok(None)` means the token
    /// was rejected (expired, revoked or malformed).
    async fn get_user(&self, access_token: &str) -> Result<Option<Identity>, IdentityError>;

    /// Rotate a refresh token into a fresh session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, IdentityError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    /// Resend the sign-up confirmation message.
    async fn resend_signup(&self, email: &str) -> Result<(), IdentityError>;

    /// Confirm a pending sign-up with the emailed one-time code.
    async fn verify_signup_otp(&self, email: &str, token: &str) -> Result<AuthSession, IdentityError>;
}
