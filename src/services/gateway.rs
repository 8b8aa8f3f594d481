//! Auth gateway: the façade every page and the route guard use to talk to
//! the identity service.
//!
//! DESIGN
//! ======
//! All operations return `Result<_, AuthError>`; identity service failures
//! are caught here and classified into a small taxonomy the pages can show.
//! A gateway without a provider (service not configured) answers every call
//! with [`AuthError::ConfigurationMissing`] instead of panicking, which keeps
//! the whole site navigable in a misconfigured environment.
//!
//! Successful state changes are announced on the browser context's
//! [`AuthEvents`] channel. Callers learn where to navigate from the returned
//! outcome; the gateway never navigates itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::events::{AuthEventKind, AuthEvents};
use crate::identity::{AuthSession, Identity, IdentityError, IdentityProvider, pkce};
use crate::paths;

const CODE_LEN: usize = 6;
pub const SUPPORTED_OAUTH_PROVIDERS: &[&str] = &["google", "github"];
const DUPLICATE_ACCOUNT_MESSAGE: &str = "User already registered";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("identity service not configured")]
    ConfigurationMissing,
    #[error("{0}")]
    Validation(String),
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Token has expired or is invalid")]
    InvalidCode,
    #[error("identity service error: {0}")]
    Service(String),
}

impl AuthError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing => "configuration_missing",
            Self::Validation(_) => "validation_error",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidCode => "invalid_code",
            Self::Service(_) => "service_error",
        }
    }

    /// Whether this is the "account already exists" flavour of validation error.
    #[must_use]
    pub fn is_duplicate_account(&self) -> bool {
        match self {
            Self::Validation(message) => {
                let lower = message.to_ascii_lowercase();
                lower.contains("already registered") || lower.contains("already exists")
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    SignUp,
    SignIn,
    OAuthExchange,
    Refresh,
    Resend,
    Verify,
}

fn classify(op: Operation, err: IdentityError) -> AuthError {
    let IdentityError::Api { status, code, message } = &err else {
        return AuthError::Service(err.to_string());
    };
    if !err.is_rejection() {
        return AuthError::Service(err.to_string());
    }
    let code = code.as_deref().unwrap_or_default();

    match op {
        Operation::SignIn => {
            if matches!(code, "invalid_credentials" | "invalid_grant") || message.contains("Invalid login credentials") {
                AuthError::InvalidCredentials
            } else {
                AuthError::Validation(message.clone())
            }
        }
        Operation::Refresh => AuthError::InvalidCredentials,
        Operation::OAuthExchange => AuthError::Service(message.clone()),
        Operation::Verify if *status != 429 => AuthError::InvalidCode,
        Operation::SignUp if matches!(code, "user_already_exists" | "email_exists") => {
            let lower = message.to_ascii_lowercase();
            if lower.contains("already registered") || lower.contains("already exists") {
                AuthError::Validation(message.clone())
            } else {
                AuthError::Validation(DUPLICATE_ACCOUNT_MESSAGE.to_owned())
            }
        }
        Operation::SignUp | Operation::Resend | Operation::Verify => AuthError::Validation(message.clone()),
    }
}

// =============================================================================
// INPUT NORMALIZATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => Some(normalized),
        _ => None,
    }
}

/// Six ASCII alphanumerics after trimming.
#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.len() != CODE_LEN || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_owned())
}

fn require_email(email: &str) -> Result<String, AuthError> {
    normalize_email(email).ok_or_else(|| AuthError::Validation("Invalid email address".into()))
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// All three fields are `None` when the service accepted the sign-up but
/// returned no user record; the caller stays on the form.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    /// Email to remember for the confirmation screen's resend control.
    pub pending_email: Option<String>,
    pub identity: Option<Identity>,
    pub redirect: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub session: AuthSession,
    pub redirect: &'static str,
}

#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub authorize_url: String,
    /// PKCE verifier the callback must present; kept by the caller.
    pub code_verifier: String,
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub session: AuthSession,
    pub redirect: &'static str,
    pub delay: Duration,
}

// =============================================================================
// GATEWAY
// =============================================================================

#[derive(Clone)]
pub struct AuthGateway {
    provider: Option<Arc<dyn IdentityProvider>>,
    events: AuthEvents,
}

impl AuthGateway {
    #[must_use]
    pub fn new(provider: Option<Arc<dyn IdentityProvider>>, events: AuthEvents) -> Self {
        Self { provider, events }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    fn provider(&self) -> Result<&dyn IdentityProvider, AuthError> {
        self.provider
            .as_deref()
            .ok_or(AuthError::ConfigurationMissing)
    }

    /// Create an account pending email verification.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input or an existing account, `Service` otherwise.
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<SignUpOutcome, AuthError> {
        let provider = self.provider()?;
        let email = require_email(email)?;
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".into()));
        }
        let display_name = display_name.trim();

        let identity = provider
            .sign_up(&email, password, display_name)
            .await
            .map_err(|e| classify(Operation::SignUp, e))?;

        let Some(identity) = identity else {
            warn!(email = %email, "sign-up returned no user record");
            return Ok(SignUpOutcome { pending_email: None, identity: None, redirect: None });
        };
        info!(email = %email, "sign-up pending verification");
        Ok(SignUpOutcome {
            pending_email: Some(email),
            identity: Some(identity),
            redirect: Some(paths::EMAIL_CONFIRMATION),
        })
    }

    /// Password sign-in.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` on a wrong email/password pair, `Service` otherwise.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, AuthError> {
        let provider = self.provider()?;
        let email = require_email(email)?;

        let session = provider
            .sign_in_with_password(&email, password)
            .await
            .map_err(|e| classify(Operation::SignIn, e))?;

        self.events
            .emit(AuthEventKind::SignedIn, Some(session.identity.clone()));
        Ok(SignInOutcome { session, redirect: paths::INTROS })
    }

    /// Start an OAuth flow. Completion arrives later through the callback
    /// route and is announced as a `SignedIn` event, not through this return.
    ///
    /// # Errors
    ///
    /// `Validation` for an unsupported provider, `Service` if the URL cannot be built.
    pub fn sign_in_with_oauth(&self, provider_name: &str, origin: &str) -> Result<OAuthStart, AuthError> {
        let provider = self.provider()?;
        if !SUPPORTED_OAUTH_PROVIDERS.contains(&provider_name) {
            return Err(AuthError::Validation(format!("Unsupported provider: {provider_name}")));
        }

        let code_verifier = pkce::generate_code_verifier();
        let challenge = pkce::code_challenge(&code_verifier);
        let redirect_to = format!("{}{}", origin.trim_end_matches('/'), paths::OAUTH_CALLBACK);
        let authorize_url = provider
            .authorize_url(provider_name, &redirect_to, &challenge)
            .map_err(|e| AuthError::Service(e.to_string()))?;
        Ok(OAuthStart { authorize_url, code_verifier })
    }

    /// Finish an OAuth flow at the callback.
    ///
    /// # Errors
    ///
    /// `Service` if the code exchange fails.
    pub async fn complete_oauth(&self, auth_code: &str, code_verifier: &str) -> Result<SignInOutcome, AuthError> {
        let provider = self.provider()?;
        let session = provider
            .exchange_code(auth_code, code_verifier)
            .await
            .map_err(|e| classify(Operation::OAuthExchange, e))?;

        self.events
            .emit(AuthEventKind::SignedIn, Some(session.identity.clone()));
        Ok(SignInOutcome { session, redirect: paths::INTROS })
    }

    /// Best-effort sign-out. Always yields the landing page; a failed revoke
    /// is logged and otherwise ignored.
    pub async fn sign_out(&self, access_token: Option<&str>) -> &'static str {
        if let (Ok(provider), Some(token)) = (self.provider(), access_token) {
            if let Err(e) = provider.sign_out(token).await {
                warn!(error = %e, "identity sign-out failed; clearing local session anyway");
            }
        }
        self.events.emit(AuthEventKind::SignedOut, None);
        paths::LANDING
    }

    /// Resend the verification message for a pending sign-up.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed address, `Service` otherwise.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let provider = self.provider()?;
        let email = require_email(email)?;
        provider
            .resend_signup(&email)
            .await
            .map_err(|e| classify(Operation::Resend, e))
    }

    /// Confirm a pending sign-up with its one-time code.
    ///
    /// # Errors
    ///
    /// `InvalidCode` for a malformed, wrong or expired code, `Service` otherwise.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<VerifyOutcome, AuthError> {
        let provider = self.provider()?;
        let email = require_email(email)?;
        let code = normalize_code(code).ok_or(AuthError::InvalidCode)?;

        let session = provider
            .verify_signup_otp(&email, &code)
            .await
            .map_err(|e| classify(Operation::Verify, e))?;

        self.events
            .emit(AuthEventKind::SignedIn, Some(session.identity.clone()));
        Ok(VerifyOutcome { session, redirect: paths::INTROS, delay: paths::VERIFY_REDIRECT_DELAY })
    }

    /// Identity behind an access token. A missing or rejected token is
    /// `Ok(None)`, not an error.
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when unconfigured, `Service` on transport failure.
    pub async fn current_identity(&self, access_token: Option<&str>) -> Result<Option<Identity>, AuthError> {
        let provider = self.provider()?;
        let Some(token) = access_token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        match provider.get_user(token).await {
            Ok(identity) => Ok(identity),
            Err(e) if e.is_rejection() => Ok(None),
            Err(e) => Err(AuthError::Service(e.to_string())),
        }
    }

    /// Rotate a refresh token.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` if the refresh token is rejected, `Service` otherwise.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let provider = self.provider()?;
        let session = provider
            .refresh_session(refresh_token)
            .await
            .map_err(|e| classify(Operation::Refresh, e))?;

        self.events
            .emit(AuthEventKind::TokenRefreshed, Some(session.identity.clone()));
        Ok(session)
    }
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
