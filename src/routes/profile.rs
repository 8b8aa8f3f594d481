//! Profile routes: read the signed-in user's profile and autosave edits.
//!
//! Edits update the browser context's in-memory copy immediately and queue a
//! debounced write; the response reflects the optimistic state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use serde::Deserialize;
use tracing::error;

use super::auth::{AuthIdentity, error_body};
use crate::identity::Identity;
use crate::services::context::BrowserContext;
use crate::services::profile::{self, FieldValue, Profile, ProfileError, ProfileField};
use crate::state::AppState;

fn profile_error(err: &ProfileError) -> Response {
    match err {
        ProfileError::ReadOnlyField(_) | ProfileError::InvalidValue(_) => {
            error_body(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", &err.to_string())
        }
        ProfileError::Db(e) => {
            error!(error = %e, "profile query failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "profile_error", "Failed to load profile")
        }
    }
}

/// Make sure `slot` holds the profile for `identity`, loading it when empty
/// or when it belongs to someone else.
async fn ensure_loaded<'a>(
    state: &AppState,
    slot: &'a mut Option<Profile>,
    identity: &Identity,
) -> Result<&'a mut Profile, ProfileError> {
    if slot.as_ref().is_none_or(|p| p.id != identity.id) {
        *slot = Some(state.profiles.load(Some(identity)).await?);
    }
    Ok(slot.get_or_insert_with(|| Profile { id: identity.id, ..Profile::default() }))
}

async fn current_profile(state: &AppState, ctx: &BrowserContext, identity: &Identity) -> Result<Profile, ProfileError> {
    let mut slot = ctx.profile.lock().await;
    ensure_loaded(state, &mut slot, identity).await.cloned()
}

/// Derive a new value for `field` from the context's copy, queue its save
/// and apply it. The profile lock is held throughout so concurrent edits from
/// one browser see each other. `change` returning `None` leaves everything
/// untouched; the flag reports whether a save was queued.
async fn edit<F>(
    state: &AppState,
    ctx: &BrowserContext,
    identity: &Identity,
    field: ProfileField,
    change: F,
) -> Result<(Profile, bool), ProfileError>
where
    F: FnOnce(&Profile) -> Option<FieldValue>,
{
    let mut slot = ctx.profile.lock().await;
    let profile = ensure_loaded(state, &mut slot, identity).await?;
    let Some(value) = change(profile) else {
        return Ok((profile.clone(), false));
    };
    state.profiles.save_field(identity.id, field, value.clone())?;
    profile.apply(field, value);
    Ok((profile.clone(), true))
}

fn edited(outcome: Result<(Profile, bool), ProfileError>) -> Response {
    match outcome {
        Ok((profile, true)) => (StatusCode::ACCEPTED, Json(profile)).into_response(),
        Ok((profile, false)) => Json(profile).into_response(),
        Err(e) => profile_error(&e),
    }
}

/// `GET /api/profile`
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    AuthIdentity(identity): AuthIdentity,
) -> Response {
    match current_profile(&state, &ctx, &identity).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => profile_error(&e),
    }
}

#[derive(Deserialize)]
pub struct PatchRequest {
    field: ProfileField,
    value: FieldValue,
}

/// `PATCH /api/profile`: autosave one field.
pub async fn patch_profile(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    AuthIdentity(identity): AuthIdentity,
    Json(body): Json<PatchRequest>,
) -> Response {
    let PatchRequest { field, value } = body;
    edited(edit(&state, &ctx, &identity, field, |_| Some(value)).await)
}

#[derive(Deserialize)]
pub struct CompetitorRequest {
    name: String,
}

/// `POST /api/profile/competitors`
pub async fn add_competitor(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    AuthIdentity(identity): AuthIdentity,
    Json(body): Json<CompetitorRequest>,
) -> Response {
    let outcome = edit(&state, &ctx, &identity, ProfileField::Competitors, |current| {
        let next = profile::add_competitor(&current.competitors, &body.name);
        (next != current.competitors).then_some(FieldValue::List(next))
    })
    .await;
    edited(outcome)
}

/// `DELETE /api/profile/competitors/{name}`
pub async fn remove_competitor(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<BrowserContext>>,
    AuthIdentity(identity): AuthIdentity,
    Path(name): Path<String>,
) -> Response {
    let outcome = edit(&state, &ctx, &identity, ProfileField::Competitors, |current| {
        let next = profile::remove_competitor(&current.competitors, &name);
        (next != current.competitors).then_some(FieldValue::List(next))
    })
    .await;
    edited(outcome)
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
