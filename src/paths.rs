//! Navigation targets shared by the route guard, the auth gateway and the
//! page surface.

use std::time::Duration;

pub const LANDING: &str = "/";
pub const LOGIN: &str = "/login";
pub const SIGNUP: &str = "/signup";
pub const INTROS: &str = "/intros";
pub const PROFILE: &str = "/profile";
pub const EMAIL_CONFIRMATION: &str = "/email-confirmation";
pub const VERIFY_EMAIL: &str = "/verify-email";
pub const OAUTH_CALLBACK: &str = "/auth/callback";
pub const DIAGNOSTICS: &str = "/diagnostics";
pub const HEALTHZ: &str = "/healthz";

/// Pause between a successful code verification and the redirect to
/// [`INTROS`], long enough for the confirmation message to render.
pub const VERIFY_REDIRECT_DELAY: Duration = Duration::from_millis(2000);
