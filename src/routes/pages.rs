//! Page shells.
//!
//! Each page is a bare HTML document wired to the JSON API; layout and
//! styling live outside this service. Access control has already happened
//! in the route guard by the time these handlers run.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::Extension;
use axum_extra::extract::cookie::CookieJar;

use crate::cookies;
use crate::identity::Identity;
use crate::paths;
use crate::services::context::BrowserContext;
use crate::services::diagnostics::{self, ProbeOutcome};
use crate::state::AppState;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>{} · Waly</title></head>\n<body>\n{body}\n</body></html>\n",
        escape(title)
    ))
}

fn display_name(identity: &Identity) -> &str {
    identity
        .display_name
        .as_deref()
        .or(identity.email.as_deref())
        .unwrap_or("there")
}

/// `GET /`
pub async fn landing() -> Html<String> {
    page(
        "Welcome",
        &format!("<h1>Waly</h1>\n<a href=\"{}\">Sign up</a> <a href=\"{}\">Log in</a>", paths::SIGNUP, paths::LOGIN),
    )
}

/// `GET /signup`
pub async fn signup() -> Html<String> {
    page(
        "Sign up",
        "<h1>Create your account</h1>\n\
         <form data-api=\"/api/auth/signup\" method=\"post\">\n\
         <input name=\"display_name\" placeholder=\"Full name\">\n\
         <input name=\"email\" type=\"email\" required>\n\
         <input name=\"password\" type=\"password\" required>\n\
         <button type=\"submit\">Sign up</button>\n</form>\n\
         <a href=\"/auth/oauth/google\">Continue with Google</a>",
    )
}

/// `GET /login`
pub async fn login() -> Html<String> {
    page(
        "Log in",
        "<h1>Log in</h1>\n\
         <form data-api=\"/api/auth/login\" method=\"post\">\n\
         <input name=\"email\" type=\"email\" required>\n\
         <input name=\"password\" type=\"password\" required>\n\
         <button type=\"submit\">Log in</button>\n</form>\n\
         <a href=\"/auth/oauth/google\">Continue with Google</a>",
    )
}

/// `GET /email-confirmation`: shows the pending address with a resend control.
pub async fn email_confirmation(jar: CookieJar) -> Html<String> {
    let email = cookies::read(&jar, cookies::PENDING_EMAIL).unwrap_or_default();
    page(
        "Check your email",
        &format!(
            "<h1>Check your email</h1>\n<p>We sent a confirmation code to <strong>{}</strong>.</p>\n\
             <form data-api=\"/api/auth/resend\" method=\"post\"><button type=\"submit\">Resend</button></form>\n\
             <a href=\"{}\">Enter code</a>",
            escape(email),
            paths::VERIFY_EMAIL
        ),
    )
}

/// `GET /verify-email`
pub async fn verify_email() -> Html<String> {
    page(
        "Verify your email",
        "<h1>Enter your code</h1>\n\
         <form data-api=\"/api/auth/verify\" method=\"post\">\n\
         <input name=\"code\" maxlength=\"6\" autocomplete=\"one-time-code\" required>\n\
         <button type=\"submit\">Verify</button>\n</form>",
    )
}

/// `GET /intros`: authenticated landing.
pub async fn intros(identity: Option<Extension<Identity>>) -> Html<String> {
    let greeting = identity.map_or_else(|| "there".to_owned(), |Extension(i)| escape(display_name(&i)));
    page(
        "Intros",
        &format!(
            "<h1>Hi {greeting}</h1>\n<a href=\"{}\">Your profile</a>\n\
             <form data-api=\"/api/auth/logout\" method=\"post\"><button type=\"submit\">Sign out</button></form>",
            paths::PROFILE
        ),
    )
}

/// `GET /profile`: editable fields autosave through `PATCH /api/profile`.
pub async fn profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    identity: Option<Extension<Identity>>,
) -> Html<String> {
    let identity = identity.map(|Extension(i)| i);
    let loaded = match state.profiles.load(identity.as_ref()).await {
        Ok(profile) => {
            *ctx.profile.lock().await = Some(profile.clone());
            profile
        }
        Err(e) => {
            tracing::error!(error = %e, "profile page load failed");
            crate::services::profile::Profile::default()
        }
    };

    let mut body = String::from("<h1>Your profile</h1>\n<form data-api=\"/api/profile\" data-autosave>\n");
    for (name, value) in [
        ("full_name", &loaded.full_name),
        ("company", &loaded.company),
        ("job_title", &loaded.job_title),
        ("industry", &loaded.industry),
    ] {
        let _ = writeln!(body, "<input name=\"{name}\" value=\"{}\">", escape(value));
    }
    let _ = writeln!(body, "<input name=\"email\" value=\"{}\" readonly>\n</form>\n<ul id=\"competitors\">", escape(&loaded.email));
    for competitor in &loaded.competitors {
        let _ = writeln!(body, "<li>{}</li>", escape(competitor));
    }
    body.push_str("</ul>");
    page("Profile", &body)
}

/// `GET /diagnostics`: human-readable connectivity check.
pub async fn diagnostics(State(state): State<AppState>) -> Html<String> {
    let report = diagnostics::run(state.identity_config.as_ref(), state.profiles.is_configured()).await;
    let status = match report.status {
        ProbeOutcome::Connected => "Connected",
        ProbeOutcome::Failed => "Connection failed",
        ProbeOutcome::NotConfigured => "Not configured",
    };
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    page(
        "Diagnostics",
        &format!(
            "<h1>Diagnostics</h1>\n<dl>\n<dt>Identity service URL</dt><dd>{}</dd>\n\
             <dt>API key configured</dt><dd>{}</dd>\n<dt>Profile database configured</dt><dd>{}</dd>\n\
             <dt>Status</dt><dd>{status}</dd>\n<dt>Detail</dt><dd>{}</dd>\n</dl>",
            escape(report.identity_url.as_deref().unwrap_or("(unset)")),
            yes_no(report.api_key_configured),
            yes_no(report.database_configured),
            escape(report.detail.as_deref().unwrap_or("")),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(escape("<b>\"Ada\" & 'co'</b>"), "&lt;b&gt;&quot;Ada&quot; &amp; &#39;co&#39;&lt;/b&gt;");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let identity = Identity {
            id: uuid::Uuid::new_v4(),
            email: Some("ada@example.com".into()),
            display_name: None,
            metadata: serde_json::Value::Null,
        };
        assert_eq!(display_name(&identity), "ada@example.com");
    }
}
