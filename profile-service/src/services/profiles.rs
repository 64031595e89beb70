/// Profile identity management
///
/// Owns the two invariants of the persona model: profile names are unique
/// within one account, and an account with at least one profile has exactly
/// one default. Every path that flips `is_default` runs the
/// demote-siblings-then-promote sequence inside a single transaction, and a
/// partial unique index on `(account_id) WHERE is_default` backstops races.
use crate::domain::models::{Profile, ProfileKind, ProfileSettings, VisibilityStatus};
use crate::error::{Result, ServiceError};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "id, account_id, profile_name, display_name, bio, avatar_url, \
     kind, visibility, is_active, is_default, settings, metadata, created_at, updated_at";

/// Fields for creating a profile
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub account_id: Uuid,
    pub profile_name: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub kind: ProfileKind,
    pub visibility: VisibilityStatus,
    pub is_default: bool,
    pub settings: ProfileSettings,
    pub metadata: HashMap<String, Value>,
}

impl NewProfile {
    /// A public profile with default settings and empty metadata
    pub fn public(account_id: Uuid, profile_name: impl Into<String>) -> Self {
        let profile_name = profile_name.into();
        Self {
            account_id,
            display_name: profile_name.clone(),
            profile_name,
            bio: None,
            avatar_url: None,
            kind: ProfileKind::Public,
            visibility: VisibilityStatus::Public,
            is_default: false,
            settings: ProfileSettings::default(),
            metadata: HashMap::new(),
        }
    }
}

/// Fields for updating a profile; `None` leaves the column untouched.
/// `is_default: Some(true)` promotes the profile (and demotes its siblings);
/// `Some(false)` on the current default is ignored - the only way to move
/// the default flag is to promote another profile.
#[derive(Debug, Default, Clone)]
pub struct ProfilePatch {
    pub profile_name: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub visibility: Option<VisibilityStatus>,
    pub is_active: Option<bool>,
    pub is_default: Option<bool>,
    pub settings: Option<ProfileSettings>,
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Clone)]
pub struct ProfileService {
    pool: PgPool,
}

impl ProfileService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a profile. The first profile of an account is always the
    /// default regardless of the requested flag; any later profile created
    /// with `is_default = true` demotes its siblings in the same transaction.
    pub async fn create_profile(&self, fields: NewProfile) -> Result<Profile> {
        let mut tx = self.pool.begin().await?;

        let existing = lock_account_profiles(&mut tx, fields.account_id).await?;

        let name_taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM profiles
                WHERE account_id = $1 AND profile_name = $2
            )
            "#,
        )
        .bind(fields.account_id)
        .bind(&fields.profile_name)
        .fetch_one(&mut *tx)
        .await?;

        if name_taken {
            return Err(ServiceError::ProfileNameTaken(fields.profile_name));
        }

        let is_default = fields.is_default || existing.is_empty();
        if is_default && !existing.is_empty() {
            demote_all(&mut tx, fields.account_id, None).await?;
        }

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profiles (account_id, profile_name, display_name, bio, avatar_url,
                                  kind, visibility, is_default, settings, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(fields.account_id)
        .bind(&fields.profile_name)
        .bind(&fields.display_name)
        .bind(&fields.bio)
        .bind(&fields.avatar_url)
        .bind(fields.kind)
        .bind(fields.visibility)
        .bind(is_default)
        .bind(Json(&fields.settings))
        .bind(Json(&fields.metadata))
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| map_profile_insert_error(err, &fields.profile_name))?;

        tx.commit().await?;
        Ok(profile)
    }

    /// Update a profile. A name change re-validates uniqueness excluding the
    /// profile itself; a promotion to default demotes siblings first.
    pub async fn update_profile(&self, profile_id: Uuid, patch: ProfilePatch) -> Result<Profile> {
        let mut tx = self.pool.begin().await?;

        let account_id: Uuid = sqlx::query_scalar("SELECT account_id FROM profiles WHERE id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::ProfileNotFound)?;

        let locked = lock_account_profiles(&mut tx, account_id).await?;
        if !locked.contains(&profile_id) {
            // deleted between the lookup and the lock
            return Err(ServiceError::ProfileNotFound);
        }

        let current = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(profile_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(ref name) = patch.profile_name {
            if *name != current.profile_name {
                let taken: bool = sqlx::query_scalar(
                    r#"
                    SELECT EXISTS(
                        SELECT 1 FROM profiles
                        WHERE account_id = $1 AND profile_name = $2 AND id != $3
                    )
                    "#,
                )
                .bind(account_id)
                .bind(name)
                .bind(profile_id)
                .fetch_one(&mut *tx)
                .await?;

                if taken {
                    return Err(ServiceError::ProfileNameTaken(name.clone()));
                }
            }
        }

        let promote = patch.is_default == Some(true) && !current.is_default;
        if promote {
            demote_all(&mut tx, account_id, Some(profile_id)).await?;
        }
        if patch.is_default == Some(false) && current.is_default {
            tracing::debug!(
                %profile_id,
                "ignoring is_default=false on the current default; promote another profile instead"
            );
        }

        // Build dynamic update query
        let mut set_clauses = Vec::new();
        let mut param_index = 2; // Start after profile_id

        if patch.profile_name.is_some() {
            set_clauses.push(format!("profile_name = ${}", param_index));
            param_index += 1;
        }
        if patch.display_name.is_some() {
            set_clauses.push(format!("display_name = ${}", param_index));
            param_index += 1;
        }
        if patch.bio.is_some() {
            set_clauses.push(format!("bio = ${}", param_index));
            param_index += 1;
        }
        if patch.avatar_url.is_some() {
            set_clauses.push(format!("avatar_url = ${}", param_index));
            param_index += 1;
        }
        if patch.visibility.is_some() {
            set_clauses.push(format!("visibility = ${}", param_index));
            param_index += 1;
        }
        if patch.is_active.is_some() {
            set_clauses.push(format!("is_active = ${}", param_index));
            param_index += 1;
        }
        if promote {
            set_clauses.push("is_default = TRUE".to_string());
        }
        if patch.settings.is_some() {
            set_clauses.push(format!("settings = ${}", param_index));
            param_index += 1;
        }
        if patch.metadata.is_some() {
            set_clauses.push(format!("metadata = ${}", param_index));
        }

        if set_clauses.is_empty() {
            return Ok(current);
        }
        set_clauses.push("updated_at = NOW()".to_string());

        let query = format!(
            "UPDATE profiles SET {} WHERE id = $1 RETURNING {PROFILE_COLUMNS}",
            set_clauses.join(", ")
        );

        let mut query_builder = sqlx::query_as::<_, Profile>(&query).bind(profile_id);

        if let Some(ref profile_name) = patch.profile_name {
            query_builder = query_builder.bind(profile_name);
        }
        if let Some(ref display_name) = patch.display_name {
            query_builder = query_builder.bind(display_name);
        }
        if let Some(ref bio) = patch.bio {
            query_builder = query_builder.bind(bio);
        }
        if let Some(ref avatar_url) = patch.avatar_url {
            query_builder = query_builder.bind(avatar_url);
        }
        if let Some(visibility) = patch.visibility {
            query_builder = query_builder.bind(visibility);
        }
        if let Some(is_active) = patch.is_active {
            query_builder = query_builder.bind(is_active);
        }
        if let Some(ref settings) = patch.settings {
            query_builder = query_builder.bind(Json(settings));
        }
        if let Some(ref metadata) = patch.metadata {
            query_builder = query_builder.bind(Json(metadata));
        }

        let profile = query_builder
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| map_profile_insert_error(err, patch.profile_name.as_deref().unwrap_or("")))?;

        tx.commit().await?;
        Ok(profile)
    }

    /// Make `profile_id` the account's default: demote every sibling, then
    /// promote the target, all in one transaction.
    pub async fn set_default_profile(&self, account_id: Uuid, profile_id: Uuid) -> Result<Profile> {
        let mut tx = self.pool.begin().await?;

        let locked = lock_account_profiles(&mut tx, account_id).await?;
        if !locked.contains(&profile_id) {
            return Err(ServiceError::ProfileNotFound);
        }

        demote_all(&mut tx, account_id, Some(profile_id)).await?;

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(profile_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(profile)
    }

    /// Delete a profile. When the deleted profile was the default, the
    /// earliest-created survivor is promoted in the same transaction;
    /// deleting the last profile leaves the account with none (the boundary
    /// layer is responsible for refusing to delete an only profile).
    pub async fn delete_profile(&self, profile_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let account_id: Uuid = sqlx::query_scalar("SELECT account_id FROM profiles WHERE id = $1")
            .bind(profile_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::ProfileNotFound)?;

        let locked = lock_account_profiles(&mut tx, account_id).await?;
        if !locked.contains(&profile_id) {
            return Err(ServiceError::ProfileNotFound);
        }

        let was_default: bool =
            sqlx::query_scalar("SELECT is_default FROM profiles WHERE id = $1")
                .bind(profile_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(profile_id)
            .execute(&mut *tx)
            .await?;

        if was_default {
            sqlx::query(
                r#"
                UPDATE profiles SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM profiles
                    WHERE account_id = $1
                    ORDER BY created_at ASC
                    LIMIT 1
                )
                "#,
            )
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// List an account's profiles, default first, then by creation time
    pub async fn list_by_account(&self, account_id: Uuid) -> Result<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(&format!(
            r#"
            SELECT {PROFILE_COLUMNS} FROM profiles
            WHERE account_id = $1
            ORDER BY is_default DESC, created_at ASC
            "#
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    /// The account's default profile. Errors with not-found when none exists
    /// (e.g. an account whose starter provisioning partially failed).
    pub async fn get_default(&self, account_id: Uuid) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE account_id = $1 AND is_default"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::ProfileNotFound)
    }

    pub async fn find_by_id(&self, profile_id: Uuid) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    pub async fn count_by_account(&self, account_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Lock every profile row of the account in a stable order. All default-flag
/// transitions take this lock first, which serializes them per account and
/// keeps lock acquisition deadlock-free.
async fn lock_account_profiles(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<Vec<Uuid>> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM profiles WHERE account_id = $1 ORDER BY id FOR UPDATE",
    )
    .bind(account_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(ids)
}

/// Demote every default profile of the account (optionally sparing one)
async fn demote_all(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    except: Option<Uuid>,
) -> Result<()> {
    match except {
        Some(keep) => {
            sqlx::query(
                r#"
                UPDATE profiles SET is_default = FALSE, updated_at = NOW()
                WHERE account_id = $1 AND is_default AND id != $2
                "#,
            )
            .bind(account_id)
            .bind(keep)
            .execute(&mut **tx)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE profiles SET is_default = FALSE, updated_at = NOW()
                WHERE account_id = $1 AND is_default
                "#,
            )
            .bind(account_id)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(())
}

/// Map constraint violations to the service taxonomy. The scoped-name
/// constraint becomes a name conflict; the one-default partial index only
/// trips when two writers raced, which surfaces as an internal error rather
/// than two defaults.
fn map_profile_insert_error(err: sqlx::Error, profile_name: &str) -> ServiceError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("profiles_account_id_profile_name_key") => {
                    ServiceError::ProfileNameTaken(profile_name.to_string())
                }
                Some("uq_profiles_one_default_per_account") => ServiceError::Internal(
                    "default profile changed concurrently".to_string(),
                ),
                _ => ServiceError::ProfileNameTaken(profile_name.to_string()),
            };
        }
    }
    err.into()
}
