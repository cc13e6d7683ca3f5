//! Handle ledger database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{LikedPage, PageRequest, PreferenceRecord, Signal};
use crate::error::Result;
use crate::user::UserProfile;

/// Preference ledger. Mutations are committed when the call returns.
#[async_trait]
pub trait PreferenceLedger: Send + Sync {
    /// Upsert the (user, item) preference and, for likes, add the item to the
    /// liked set. Both writes share one transaction.
    async fn set_preference(&self, user: &UserProfile, signal: &Signal) -> Result<()>;

    /// Current preference of `user` for `item_id`.
    async fn preference(
        &self,
        user: &UserProfile,
        item_id: &str,
    ) -> Result<Option<PreferenceRecord>>;

    /// Page of liked items, oldest first.
    async fn liked_items(&self, user: &UserProfile, page: PageRequest) -> Result<LikedPage>;

    /// Every purchased item, oldest first.
    async fn purchased_items(&self, user: &UserProfile) -> Result<Vec<String>>;

    /// Add items to the purchased set. Already present items are ignored.
    async fn mark_purchased(&self, user: &UserProfile, item_ids: &[String]) -> Result<()>;
}

/// [`PreferenceLedger`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgLedger {
    pool: Pool<Postgres>,
}

impl PgLedger {
    /// Create a new [`PgLedger`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceLedger for PgLedger {
    async fn set_preference(&self, user: &UserProfile, signal: &Signal) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO user_preferences (user_id, item_id, preference)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, item_id) DO UPDATE SET
                    preference = EXCLUDED.preference,
                    updated_at = NOW()"#,
        )
        .bind(user.id)
        .bind(&signal.item_id)
        .bind(signal.value)
        .execute(&mut *tx)
        .await?;

        if signal.liked {
            sqlx::query(
                r#"INSERT INTO liked_items (user_id, item_id) VALUES ($1, $2)
                    ON CONFLICT (user_id, item_id) DO NOTHING"#,
            )
            .bind(user.id)
            .bind(&signal.item_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn preference(
        &self,
        user: &UserProfile,
        item_id: &str,
    ) -> Result<Option<PreferenceRecord>> {
        let record = sqlx::query_as::<_, PreferenceRecord>(
            r#"SELECT user_id, item_id, preference, updated_at
                FROM user_preferences WHERE user_id = $1 AND item_id = $2"#,
        )
        .bind(user.id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn liked_items(&self, user: &UserProfile, page: PageRequest) -> Result<LikedPage> {
        let total_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM liked_items WHERE user_id = $1")
                .bind(user.id)
                .fetch_one(&self.pool)
                .await?;

        let item_ids = sqlx::query_scalar::<_, String>(
            r#"SELECT item_id FROM liked_items WHERE user_id = $1
                ORDER BY added_at, item_id
                LIMIT $2 OFFSET $3"#,
        )
        .bind(user.id)
        .bind(i64::from(page.page_size))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(LikedPage {
            item_ids,
            total_count: u64::try_from(total_count).unwrap_or_default(),
        })
    }

    async fn purchased_items(&self, user: &UserProfile) -> Result<Vec<String>> {
        let item_ids = sqlx::query_scalar::<_, String>(
            r#"SELECT item_id FROM purchased_items WHERE user_id = $1
                ORDER BY added_at, item_id"#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(item_ids)
    }

    async fn mark_purchased(&self, user: &UserProfile, item_ids: &[String]) -> Result<()> {
        if item_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"INSERT INTO purchased_items (user_id, item_id)
                SELECT $1, item_id FROM UNNEST($2::text[]) AS requested(item_id)
                ON CONFLICT (user_id, item_id) DO NOTHING"#,
        )
        .bind(user.id)
        .bind(item_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
