/// Account creation and starter-profile bootstrap
///
/// Creating an account synchronously attempts to provision two starter
/// profiles: a public default named after the account's display name, and a
/// private anonymous one with a generated name. Provisioning is best-effort:
/// once the account row is persisted, creation succeeds even if either
/// profile fails, so callers must treat "has a default profile" as something
/// to re-check rather than assume.
use crate::domain::models::{Account, AccountRole, ProfileKind, VisibilityStatus};
use crate::error::{Result, ServiceError};
use crate::services::profiles::{NewProfile, ProfileService};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

/// Prefix of generated anonymous profile names, e.g. "Anon204817"
pub const ANONYMOUS_NAME_PREFIX: &str = "Anon";

/// Fields for creating an account. The credential hash is produced by the
/// authentication layer; this service stores it verbatim.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub handle: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: AccountRole,
}

#[derive(Clone)]
pub struct AccountService {
    pool: PgPool,
    profiles: ProfileService,
}

impl AccountService {
    pub fn new(pool: PgPool, profiles: ProfileService) -> Self {
        Self { pool, profiles }
    }

    /// Persist the account, then provision its starter profiles best-effort
    pub async fn create_account(&self, fields: NewAccount) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (email, handle, display_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, handle, display_name, password_hash, role,
                      created_at, updated_at
            "#,
        )
        .bind(&fields.email)
        .bind(&fields.handle)
        .bind(&fields.display_name)
        .bind(&fields.password_hash)
        .bind(fields.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| map_account_insert_error(err, &fields))?;

        self.provision_starter_profiles(&account).await;

        Ok(account)
    }

    pub async fn find_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, handle, display_name, password_hash, role,
                   created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, handle, display_name, password_hash, role,
                   created_at, updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Best-effort starter profiles: a public default named after the
    /// account, plus a private anonymous persona. Failures are logged and
    /// swallowed - account creation already succeeded.
    async fn provision_starter_profiles(&self, account: &Account) {
        let public = NewProfile {
            is_default: true,
            ..NewProfile::public(account.id, account.display_name.clone())
        };
        if let Err(err) = self.profiles.create_profile(public).await {
            tracing::warn!(
                account_id = %account.id,
                "failed to provision public starter profile: {}",
                err
            );
        }

        let anonymous = NewProfile {
            kind: ProfileKind::Anonymous,
            visibility: VisibilityStatus::Private,
            ..NewProfile::public(account.id, anonymous_profile_name())
        };
        if let Err(err) = self.profiles.create_profile(anonymous).await {
            tracing::warn!(
                account_id = %account.id,
                "failed to provision anonymous starter profile: {}",
                err
            );
        }
    }
}

/// Fixed prefix plus a 6-digit random suffix
pub(crate) fn anonymous_profile_name() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{:06}", ANONYMOUS_NAME_PREFIX, suffix)
}

fn map_account_insert_error(err: sqlx::Error, fields: &NewAccount) -> ServiceError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let which = match db_err.constraint() {
                Some("accounts_handle_key") => fields.handle.clone(),
                _ => fields.email.clone(),
            };
            return ServiceError::AccountExists(which);
        }
    }
    err.into()
}
