use async_trait::async_trait;
use uuid::Uuid;

/// Narrow interface to the category counter store. Content creation and
/// deletion report deltas through this seam; how categories persist their
/// counts is someone else's problem.
#[async_trait]
pub trait CategoryCounters: Send + Sync {
    async fn adjust_count(
        &self,
        category_id: Uuid,
        post_delta: i64,
        question_delta: i64,
    ) -> anyhow::Result<()>;
}

/// Default collaborator when no counter store is wired up
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCategoryCounters;

#[async_trait]
impl CategoryCounters for NoopCategoryCounters {
    async fn adjust_count(
        &self,
        category_id: Uuid,
        post_delta: i64,
        question_delta: i64,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            %category_id,
            post_delta,
            question_delta,
            "category counter adjustment skipped (no counter store configured)"
        );
        Ok(())
    }
}
