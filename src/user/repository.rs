//! Handle profile database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::user::{NewProfile, Provisioned, UserProfile};

/// Durable mapping from subject id to [`UserProfile`].
///
/// Every write is a single atomic statement keyed by the unique `subject_id`,
/// so concurrent first requests for one subject converge on one row.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Return the profile for `profile.subject_id`, inserting it if absent.
    /// An existing profile is returned untouched.
    async fn get_or_create(&self, profile: &NewProfile) -> Result<UserProfile>;

    /// Insert the profile, or refresh the mutable fields of an existing one.
    async fn create_or_update(&self, profile: &NewProfile) -> Result<Provisioned>;

    /// Find a profile without creating it.
    async fn find(&self, subject_id: &str) -> Result<Option<UserProfile>>;

    /// Delete a profile with its preferences and memberships.
    async fn delete(&self, profile: &UserProfile) -> Result<()>;
}

const GET_OR_CREATE_ATTEMPTS: u32 = 3;

#[derive(sqlx::FromRow)]
struct ProvisionedRow {
    #[sqlx(flatten)]
    profile: UserProfile,
    created: bool,
}

/// [`ProfileStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgProfileStore {
    pool: Pool<Postgres>,
}

impl PgProfileStore {
    /// Create a new [`PgProfileStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get_or_create(&self, profile: &NewProfile) -> Result<UserProfile> {
        // A row committed by a concurrent insert is invisible to this
        // statement's snapshot, so the lookup is retried.
        for attempt in 1..=GET_OR_CREATE_ATTEMPTS {
            let row = sqlx::query_as::<_, UserProfile>(
                r#"WITH inserted AS (
                    INSERT INTO user_profiles (subject_id, username, email)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (subject_id) DO NOTHING
                    RETURNING id, subject_id, username, email, created_at, updated_at
                )
                SELECT id, subject_id, username, email, created_at, updated_at FROM inserted
                UNION ALL
                SELECT id, subject_id, username, email, created_at, updated_at
                    FROM user_profiles
                    WHERE subject_id = $1 AND NOT EXISTS (SELECT 1 FROM inserted)"#,
            )
            .bind(&profile.subject_id)
            .bind(&profile.username)
            .bind(&profile.email)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = row {
                return Ok(row);
            }
            tracing::debug!(subject_id = %profile.subject_id, attempt, "profile raced, retrying lookup");
        }

        Err(ServerError::Internal {
            details: format!("profile '{}' could not be read back", profile.subject_id),
            source: None,
        })
    }

    async fn create_or_update(&self, profile: &NewProfile) -> Result<Provisioned> {
        // `xmax = 0` only holds for a freshly inserted tuple.
        let row = sqlx::query_as::<_, ProvisionedRow>(
            r#"INSERT INTO user_profiles (subject_id, username, email)
                VALUES ($1, $2, $3)
                ON CONFLICT (subject_id) DO UPDATE SET
                    username = COALESCE($4, user_profiles.username),
                    email = CASE WHEN EXCLUDED.email = '' THEN user_profiles.email ELSE EXCLUDED.email END,
                    updated_at = NOW()
                RETURNING id, subject_id, username, email, created_at, updated_at, (xmax = 0) AS created"#,
        )
        .bind(&profile.subject_id)
        .bind(&profile.username)
        .bind(&profile.email)
        .bind(&profile.explicit_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Provisioned {
            profile: row.profile,
            created: row.created,
        })
    }

    async fn find(&self, subject_id: &str) -> Result<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"SELECT id, subject_id, username, email, created_at, updated_at
                FROM user_profiles WHERE subject_id = $1"#,
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn delete(&self, profile: &UserProfile) -> Result<()> {
        let result = sqlx::query("DELETE FROM user_profiles WHERE id = $1")
            .bind(profile.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(subject_id = %profile.subject_id, "profile was already deleted");
        }

        Ok(())
    }
}
