//! Cookie names and builders shared by the guard and the routes.
//!
//! All cookies are host-wide (`Path=/`), `SameSite=Lax` and `HttpOnly`;
//! `Secure` follows the server config.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use uuid::Uuid;

use crate::identity::AuthTokens;

pub const CONTEXT: &str = "waly_ctx";
pub const ACCESS_TOKEN: &str = "waly_access_token";
pub const REFRESH_TOKEN: &str = "waly_refresh_token";
pub const PENDING_EMAIL: &str = "waly_pending_email";
pub const OAUTH_VERIFIER: &str = "waly_oauth_verifier";

const CONTEXT_MAX_AGE: Duration = Duration::days(365);
const REFRESH_MAX_AGE: Duration = Duration::days(30);
const PENDING_EMAIL_MAX_AGE: Duration = Duration::days(7);
const OAUTH_VERIFIER_MAX_AGE: Duration = Duration::minutes(10);

fn build(name: &'static str, value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

fn removal(name: &'static str, secure: bool) -> Cookie<'static> {
    build(name, String::new(), secure, Duration::ZERO)
}

/// Value of `name`, treating an empty cookie as absent.
#[must_use]
pub fn read<'a>(jar: &'a CookieJar, name: &str) -> Option<&'a str> {
    jar.get(name)
        .map(Cookie::value)
        .filter(|v| !v.is_empty())
}

#[must_use]
pub fn context_id(jar: &CookieJar) -> Option<Uuid> {
    read(jar, CONTEXT).and_then(|v| Uuid::parse_str(v).ok())
}

#[must_use]
pub fn context(id: Uuid, secure: bool) -> Cookie<'static> {
    build(CONTEXT, id.to_string(), secure, CONTEXT_MAX_AGE)
}

/// Store a freshly issued session.
#[must_use]
pub fn set_session(jar: CookieJar, tokens: &AuthTokens, secure: bool) -> CookieJar {
    let access_age = Duration::seconds(tokens.expires_in.max(0));
    jar.add(build(ACCESS_TOKEN, tokens.access_token.clone(), secure, access_age))
        .add(build(REFRESH_TOKEN, tokens.refresh_token.clone(), secure, REFRESH_MAX_AGE))
}

#[must_use]
pub fn clear_session(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(removal(ACCESS_TOKEN, secure))
        .add(removal(REFRESH_TOKEN, secure))
}

#[must_use]
pub fn pending_email(email: &str, secure: bool) -> Cookie<'static> {
    build(PENDING_EMAIL, email.to_owned(), secure, PENDING_EMAIL_MAX_AGE)
}

#[must_use]
pub fn clear_pending_email(secure: bool) -> Cookie<'static> {
    removal(PENDING_EMAIL, secure)
}

#[must_use]
pub fn oauth_verifier(verifier: &str, secure: bool) -> Cookie<'static> {
    build(OAUTH_VERIFIER, verifier.to_owned(), secure, OAUTH_VERIFIER_MAX_AGE)
}

#[must_use]
pub fn clear_oauth_verifier(secure: bool) -> Cookie<'static> {
    removal(OAUTH_VERIFIER, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> AuthTokens {
        AuthTokens { access_token: "at".into(), refresh_token: "rt".into(), expires_in: 3600 }
    }

    #[test]
    fn session_cookies_are_http_only_and_lax() {
        let jar = set_session(CookieJar::new(), &tokens(), true);
        let access = jar.get(ACCESS_TOKEN).unwrap();
        assert_eq!(access.value(), "at");
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));
        assert_eq!(access.max_age(), Some(Duration::seconds(3600)));
        assert_eq!(jar.get(REFRESH_TOKEN).unwrap().value(), "rt");
    }

    #[test]
    fn clearing_expires_both_tokens() {
        let jar = clear_session(set_session(CookieJar::new(), &tokens(), false), false);
        assert_eq!(read(&jar, ACCESS_TOKEN), None);
        assert_eq!(jar.get(REFRESH_TOKEN).unwrap().max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn context_id_ignores_garbage() {
        let id = Uuid::new_v4();
        let jar = CookieJar::new().add(context(id, false));
        assert_eq!(context_id(&jar), Some(id));

        let jar = CookieJar::new().add(Cookie::new(CONTEXT, "not-a-uuid"));
        assert_eq!(context_id(&jar), None);
    }
}
