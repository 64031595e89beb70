/// Engagement state machine
///
/// Tracks like/dislike/save/share per (content item, profile) pair. The
/// membership tables are the source of truth; the counters on
/// `content_items` are cached cardinalities that move only inside the same
/// transaction as the membership change. Like and dislike are mutually
/// exclusive by construction: one `content_reactions` row per pair, flipped
/// in place. Saves toggle independently; shares are one-way.
///
/// Every operation errors only when the content item is missing; repeating a
/// reaction or removing an absent one is a no-op.
use crate::domain::models::{EngagementCounts, EngagementState, ReactionKind};
use crate::error::{Result, ServiceError};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct EngagementService {
    pool: PgPool,
}

impl EngagementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn like(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.set_reaction(content_id, profile_id, ReactionKind::Like)
            .await
    }

    pub async fn unlike(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.clear_reaction(content_id, profile_id, ReactionKind::Like)
            .await
    }

    pub async fn dislike(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.set_reaction(content_id, profile_id, ReactionKind::Dislike)
            .await
    }

    pub async fn remove_dislike(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.clear_reaction(content_id, profile_id, ReactionKind::Dislike)
            .await
    }

    /// Save toggle on; independent of the like/dislike axis
    pub async fn save(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        lock_content(&mut tx, content_id).await?;

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO content_saves (content_id, profile_id)
            VALUES ($1, $2)
            ON CONFLICT (content_id, profile_id) DO NOTHING
            RETURNING content_id
            "#,
        )
        .bind(content_id)
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

        if inserted {
            bump_counter(&mut tx, content_id, "save_count", 1).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn unsave(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        lock_content(&mut tx, content_id).await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM content_saves
            WHERE content_id = $1 AND profile_id = $2
            "#,
        )
        .bind(content_id)
        .bind(profile_id)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if removed {
            bump_counter(&mut tx, content_id, "save_count", -1).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Shares are monotonic: add-only, no retraction
    pub async fn share(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        lock_content(&mut tx, content_id).await?;

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO content_shares (content_id, profile_id)
            VALUES ($1, $2)
            ON CONFLICT (content_id, profile_id) DO NOTHING
            RETURNING content_id
            "#,
        )
        .bind(content_id)
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

        if inserted {
            bump_counter(&mut tx, content_id, "share_count", 1).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// A profile's full engagement state against one item
    pub async fn engagement_state(
        &self,
        content_id: Uuid,
        profile_id: Uuid,
    ) -> Result<EngagementState> {
        ensure_content_exists(&self.pool, content_id).await?;

        let (reaction, saved, shared): (Option<ReactionKind>, bool, bool) = sqlx::query_as(
            r#"
            SELECT
                (SELECT reaction FROM content_reactions
                 WHERE content_id = $1 AND profile_id = $2),
                EXISTS(SELECT 1 FROM content_saves
                       WHERE content_id = $1 AND profile_id = $2),
                EXISTS(SELECT 1 FROM content_shares
                       WHERE content_id = $1 AND profile_id = $2)
            "#,
        )
        .bind(content_id)
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(EngagementState {
            reaction,
            saved,
            shared,
        })
    }

    pub async fn counts(&self, content_id: Uuid) -> Result<EngagementCounts> {
        sqlx::query_as::<_, EngagementCounts>(
            r#"
            SELECT like_count, dislike_count, save_count, share_count
            FROM content_items
            WHERE id = $1
            "#,
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::ContentNotFound)
    }

    /// Set the exclusive reaction. An opposite reaction is flipped in place,
    /// adjusting both counters in one transaction, so no caller ever observes
    /// an intermediate neutral state.
    async fn set_reaction(
        &self,
        content_id: Uuid,
        profile_id: Uuid,
        reaction: ReactionKind,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        lock_content(&mut tx, content_id).await?;

        let previous: Option<ReactionKind> = sqlx::query_scalar(
            r#"
            SELECT reaction FROM content_reactions
            WHERE content_id = $1 AND profile_id = $2
            "#,
        )
        .bind(content_id)
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await?;

        if previous == Some(reaction) {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO content_reactions (content_id, profile_id, reaction)
            VALUES ($1, $2, $3)
            ON CONFLICT (content_id, profile_id) DO UPDATE SET reaction = EXCLUDED.reaction
            "#,
        )
        .bind(content_id)
        .bind(profile_id)
        .bind(reaction)
        .execute(&mut *tx)
        .await?;

        bump_counter(&mut tx, content_id, counter_column(reaction), 1).await?;
        if let Some(prev) = previous {
            bump_counter(&mut tx, content_id, counter_column(prev), -1).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove the given reaction if present
    async fn clear_reaction(
        &self,
        content_id: Uuid,
        profile_id: Uuid,
        reaction: ReactionKind,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        lock_content(&mut tx, content_id).await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM content_reactions
            WHERE content_id = $1 AND profile_id = $2 AND reaction = $3
            "#,
        )
        .bind(content_id)
        .bind(profile_id)
        .bind(reaction)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if removed {
            bump_counter(&mut tx, content_id, counter_column(reaction), -1).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn counter_column(reaction: ReactionKind) -> &'static str {
    match reaction {
        ReactionKind::Like => "like_count",
        ReactionKind::Dislike => "dislike_count",
    }
}

/// Lock the content row, serializing engagement writes per item.
/// Errors with not-found when the item is missing.
async fn lock_content(tx: &mut Transaction<'_, Postgres>, content_id: Uuid) -> Result<()> {
    let found: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM content_items WHERE id = $1 FOR UPDATE")
            .bind(content_id)
            .fetch_optional(&mut **tx)
            .await?;

    found.map(|_| ()).ok_or(ServiceError::ContentNotFound)
}

async fn ensure_content_exists(pool: &PgPool, content_id: Uuid) -> Result<()> {
    let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM content_items WHERE id = $1")
        .bind(content_id)
        .fetch_optional(pool)
        .await?;

    found.map(|_| ()).ok_or(ServiceError::ContentNotFound)
}

async fn bump_counter(
    tx: &mut Transaction<'_, Postgres>,
    content_id: Uuid,
    column: &'static str,
    delta: i64,
) -> Result<()> {
    sqlx::query(&format!(
        "UPDATE content_items SET {column} = {column} + $2, updated_at = NOW() WHERE id = $1"
    ))
    .bind(content_id)
    .bind(delta)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
