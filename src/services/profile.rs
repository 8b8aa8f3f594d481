//! Profile store: the user's editable profile record.
//!
//! DESIGN
//! ======
//! Records live in the `profiles` table keyed by identity id. Reads are
//! point lookups; a missing row is created on first read. Writes are
//! single-column updates funnelled through a [`Debouncer`] keyed by
//! `(profile id, field)`, so a burst of keystrokes on one field produces a
//! single write carrying the final value.
//!
//! ERROR HANDLING
//! ==============
//! Debounced writes are fire-and-forget: failures are logged and the
//! caller's optimistic in-memory copy is left as is (no rollback).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{error, warn};
use uuid::Uuid;

use super::debounce::{DebouncedSink, Debouncer};
use crate::identity::Identity;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub company: String,
    pub job_title: String,
    pub industry: String,
    pub competitors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    FullName,
    Email,
    Company,
    JobTitle,
    Industry,
    Competitors,
}

impl ProfileField {
    /// Column name in the `profiles` table.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::Email => "email",
            Self::Company => "company",
            Self::JobTitle => "job_title",
            Self::Industry => "industry",
            Self::Competitors => "competitors",
        }
    }

    /// The email mirrors the verified identity and is not user-editable.
    #[must_use]
    pub fn editable(self) -> bool {
        !matches!(self, Self::Email)
    }

    fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Self::Competitors, FieldValue::List(_)) | (
                Self::FullName | Self::Email | Self::Company | Self::JobTitle | Self::Industry,
                FieldValue::Text(_)
            )
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl Profile {
    /// Apply an already validated field value in memory.
    pub fn apply(&mut self, field: ProfileField, value: FieldValue) {
        match (field, value) {
            (ProfileField::FullName, FieldValue::Text(v)) => self.full_name = v,
            (ProfileField::Email, FieldValue::Text(v)) => self.email = v,
            (ProfileField::Company, FieldValue::Text(v)) => self.company = v,
            (ProfileField::JobTitle, FieldValue::Text(v)) => self.job_title = v,
            (ProfileField::Industry, FieldValue::Text(v)) => self.industry = v,
            (ProfileField::Competitors, FieldValue::List(v)) => self.competitors = v,
            _ => {}
        }
    }

    fn seeded_from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            full_name: identity.display_name.clone().unwrap_or_default(),
            email: identity.email.clone().unwrap_or_default(),
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("field {0} is read-only")]
    ReadOnlyField(&'static str),
    #[error("invalid value for field {0}")]
    InvalidValue(&'static str),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

// =============================================================================
// COMPETITOR LIST
// =============================================================================

/// Append `name` (trimmed). Blank names and exact duplicates are ignored.
#[must_use]
pub fn add_competitor(competitors: &[String], name: &str) -> Vec<String> {
    let name = name.trim();
    let mut next = competitors.to_vec();
    if !name.is_empty() && !competitors.iter().any(|c| c == name) {
        next.push(name.to_owned());
    }
    next
}

/// Remove every entry exactly equal to `name`; a non-member is a no-op.
#[must_use]
pub fn remove_competitor(competitors: &[String], name: &str) -> Vec<String> {
    competitors
        .iter()
        .filter(|c| c.as_str() != name)
        .cloned()
        .collect()
}

// =============================================================================
// BACKEND
// =============================================================================

#[async_trait::async_trait]
pub trait ProfileBackend: Send + Sync {
    async fn fetch(&self, id: Uuid) -> Result<Option<Profile>, ProfileError>;
    /// Insert the record unless one already exists for its id.
    async fn create(&self, profile: &Profile) -> Result<(), ProfileError>;
    async fn update_field(&self, id: Uuid, field: ProfileField, value: &FieldValue) -> Result<(), ProfileError>;
}

pub struct PgProfiles {
    pool: PgPool,
}

impl PgProfiles {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileBackend for PgProfiles {
    async fn fetch(&self, id: Uuid) -> Result<Option<Profile>, ProfileError> {
        let row = sqlx::query(
            r"SELECT id, full_name, email, company, job_title, industry, competitors
              FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Profile {
            id: r.get("id"),
            full_name: r.get::<Option<String>, _>("full_name").unwrap_or_default(),
            email: r.get::<Option<String>, _>("email").unwrap_or_default(),
            company: r.get::<Option<String>, _>("company").unwrap_or_default(),
            job_title: r.get::<Option<String>, _>("job_title").unwrap_or_default(),
            industry: r.get::<Option<String>, _>("industry").unwrap_or_default(),
            competitors: r
                .get::<Option<Vec<String>>, _>("competitors")
                .unwrap_or_default(),
        }))
    }

    async fn create(&self, profile: &Profile) -> Result<(), ProfileError> {
        sqlx::query(
            r"INSERT INTO profiles (id, full_name, email, company, job_title, industry, competitors)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(&profile.company)
        .bind(&profile.job_title)
        .bind(&profile.industry)
        .bind(&profile.competitors)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_field(&self, id: Uuid, field: ProfileField, value: &FieldValue) -> Result<(), ProfileError> {
        // Column names come from a closed enum, never from input.
        let sql = format!("UPDATE profiles SET {} = $1, updated_at = now() WHERE id = $2", field.column());
        let query = sqlx::query(&sql);
        let query = match value {
            FieldValue::Text(text) => query.bind(text),
            FieldValue::List(list) => query.bind(list),
        };
        query.bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

// =============================================================================
// STORE
// =============================================================================

type SaveKey = (Uuid, ProfileField);

struct BackendSink {
    backend: Option<Arc<dyn ProfileBackend>>,
}

#[async_trait::async_trait]
impl DebouncedSink<SaveKey, FieldValue> for BackendSink {
    async fn write(&self, (id, field): SaveKey, value: FieldValue) {
        let Some(backend) = &self.backend else {
            warn!(profile = %id, field = field.column(), "profile database not configured; dropping save");
            return;
        };
        if let Err(e) = backend.update_field(id, field, &value).await {
            error!(error = %e, profile = %id, field = field.column(), "profile save failed");
        }
    }
}

#[derive(Clone)]
pub struct ProfileStore {
    backend: Option<Arc<dyn ProfileBackend>>,
    saver: Debouncer<SaveKey, FieldValue>,
}

impl ProfileStore {
    #[must_use]
    pub fn new(backend: Option<Arc<dyn ProfileBackend>>, debounce: std::time::Duration) -> Self {
        let sink = Arc::new(BackendSink { backend: backend.clone() });
        Self { backend, saver: Debouncer::new(debounce, sink) }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Load the profile for `identity`. No identity yields the empty default
    /// without touching the database; a missing row is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or the first-read insert fails.
    pub async fn load(&self, identity: Option<&Identity>) -> Result<Profile, ProfileError> {
        let Some(identity) = identity else {
            return Ok(Profile::default());
        };
        let Some(backend) = &self.backend else {
            return Ok(Profile::seeded_from(identity));
        };

        match backend.fetch(identity.id).await? {
            Some(mut profile) => {
                if profile.email.is_empty() {
                    profile.email = identity.email.clone().unwrap_or_default();
                }
                Ok(profile)
            }
            None => {
                let profile = Profile::seeded_from(identity);
                backend.create(&profile).await?;
                Ok(profile)
            }
        }
    }

    /// Queue a debounced write of one field.
    ///
    /// # Errors
    ///
    /// Returns an error for read-only fields or a value of the wrong shape;
    /// nothing is queued in that case.
    pub fn save_field(&self, id: Uuid, field: ProfileField, value: FieldValue) -> Result<(), ProfileError> {
        validate(field, &value)?;
        self.saver.schedule((id, field), value);
        Ok(())
    }

    #[must_use]
    pub fn pending_saves(&self) -> usize {
        self.saver.pending()
    }
}

/// Check that `value` may be written to `field`.
///
/// # Errors
///
/// `ReadOnlyField` or `InvalidValue`.
pub fn validate(field: ProfileField, value: &FieldValue) -> Result<(), ProfileError> {
    if !field.editable() {
        return Err(ProfileError::ReadOnlyField(field.column()));
    }
    if !field.accepts(value) {
        return Err(ProfileError::InvalidValue(field.column()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
