/// Content ownership layer
///
/// Binds posts and questions to an owning profile and a category. Category
/// counters are adjusted best-effort through the `CategoryCounters` seam - a
/// counter failure is logged and never fails the content operation. All
/// engagement calls are delegated to the engagement state machine.
use crate::domain::models::{ContentItem, ContentKind};
use crate::error::{Result, ServiceError};
use crate::services::categories::{CategoryCounters, NoopCategoryCounters};
use crate::services::engagement::EngagementService;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const CONTENT_COLUMNS: &str = "id, profile_id, category_id, kind, title, body, tags, \
     like_count, dislike_count, save_count, share_count, \
     answer_count, is_answered, accepted_answer_id, created_at, updated_at";

/// Fields for creating a content item
#[derive(Debug, Clone)]
pub struct NewContentItem {
    pub profile_id: Uuid,
    pub category_id: Uuid,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// Search/listing filter. A free-text `search` term matches title, body and
/// tags case-insensitively, with the term treated literally.
#[derive(Debug, Default, Clone)]
pub struct ContentFilter {
    pub kind: Option<ContentKind>,
    pub category_id: Option<Uuid>,
    pub profile_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Clone)]
pub struct ContentService {
    pool: PgPool,
    engagement: EngagementService,
    categories: Arc<dyn CategoryCounters>,
}

impl ContentService {
    pub fn new(pool: PgPool, engagement: EngagementService) -> Self {
        Self {
            pool,
            engagement,
            categories: Arc::new(NoopCategoryCounters),
        }
    }

    pub fn with_category_counters(
        pool: PgPool,
        engagement: EngagementService,
        categories: Arc<dyn CategoryCounters>,
    ) -> Self {
        Self {
            pool,
            engagement,
            categories,
        }
    }

    /// Create a post or question, then report the delta to the category
    /// counter store best-effort.
    pub async fn create(&self, item: NewContentItem) -> Result<ContentItem> {
        let created = sqlx::query_as::<_, ContentItem>(&format!(
            r#"
            INSERT INTO content_items (profile_id, category_id, kind, title, body, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CONTENT_COLUMNS}
            "#
        ))
        .bind(item.profile_id)
        .bind(item.category_id)
        .bind(item.kind)
        .bind(&item.title)
        .bind(&item.body)
        .bind(&item.tags)
        .fetch_one(&self.pool)
        .await?;

        self.adjust_category(created.category_id, created.kind, 1)
            .await;

        Ok(created)
    }

    /// Delete a content item; membership sets go with it via FK cascade
    pub async fn delete(&self, content_id: Uuid) -> Result<()> {
        let (category_id, kind): (Uuid, ContentKind) = sqlx::query_as(
            "SELECT category_id, kind FROM content_items WHERE id = $1",
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::ContentNotFound)?;

        let deleted = sqlx::query("DELETE FROM content_items WHERE id = $1")
            .bind(content_id)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;

        if deleted {
            self.adjust_category(category_id, kind, -1).await;
        }

        Ok(())
    }

    pub async fn find_by_id(&self, content_id: Uuid) -> Result<Option<ContentItem>> {
        let item = sqlx::query_as::<_, ContentItem>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items WHERE id = $1"
        ))
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Filtered listing. The free-text term is escaped so user input never
    /// acts as pattern syntax, then matched case-insensitively across title,
    /// body and each tag.
    pub async fn search(&self, filter: ContentFilter) -> Result<Vec<ContentItem>> {
        // Build dynamic where clause
        let mut clauses = Vec::new();
        let mut param_index = 1;

        if filter.kind.is_some() {
            clauses.push(format!("kind = ${}", param_index));
            param_index += 1;
        }
        if filter.category_id.is_some() {
            clauses.push(format!("category_id = ${}", param_index));
            param_index += 1;
        }
        if filter.profile_id.is_some() {
            clauses.push(format!("profile_id = ${}", param_index));
            param_index += 1;
        }
        let pattern = filter.search.as_deref().map(search_pattern);
        if pattern.is_some() {
            clauses.push(format!(
                "(title ~* ${i} OR body ~* ${i} OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ~* ${i}))",
                i = param_index
            ));
            param_index += 1;
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let query = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_items {where_clause} \
             ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_index,
            param_index + 1
        );

        let mut query_builder = sqlx::query_as::<_, ContentItem>(&query);
        if let Some(kind) = filter.kind {
            query_builder = query_builder.bind(kind);
        }
        if let Some(category_id) = filter.category_id {
            query_builder = query_builder.bind(category_id);
        }
        if let Some(profile_id) = filter.profile_id {
            query_builder = query_builder.bind(profile_id);
        }
        if let Some(ref pattern) = pattern {
            query_builder = query_builder.bind(pattern);
        }
        let items = query_builder
            .bind(filter.limit.unwrap_or(50))
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    // ========== Engagement delegation ==========

    pub async fn like(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.engagement.like(content_id, profile_id).await
    }

    pub async fn unlike(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.engagement.unlike(content_id, profile_id).await
    }

    pub async fn dislike(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.engagement.dislike(content_id, profile_id).await
    }

    pub async fn remove_dislike(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.engagement.remove_dislike(content_id, profile_id).await
    }

    pub async fn save(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.engagement.save(content_id, profile_id).await
    }

    pub async fn unsave(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.engagement.unsave(content_id, profile_id).await
    }

    pub async fn share(&self, content_id: Uuid, profile_id: Uuid) -> Result<()> {
        self.engagement.share(content_id, profile_id).await
    }

    pub fn engagement(&self) -> &EngagementService {
        &self.engagement
    }

    /// Fire-and-forget counter adjustment; failure must not fail the caller
    async fn adjust_category(&self, category_id: Uuid, kind: ContentKind, delta: i64) {
        let (post_delta, question_delta) = match kind {
            ContentKind::Post => (delta, 0),
            ContentKind::Question => (0, delta),
        };
        if let Err(err) = self
            .categories
            .adjust_count(category_id, post_delta, question_delta)
            .await
        {
            tracing::warn!(
                %category_id,
                post_delta,
                question_delta,
                "category counter adjustment failed: {}",
                err
            );
        }
    }
}

/// Escape a user-supplied search term so regex metacharacters match
/// literally instead of acting as pattern syntax.
fn search_pattern(term: &str) -> String {
    regex::escape(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_escapes_metacharacters() {
        assert_eq!(search_pattern("c++"), r"c\+\+");
        assert_eq!(search_pattern("what?"), r"what\?");
        assert_eq!(search_pattern("a.b(c)"), r"a\.b\(c\)");
        assert_eq!(search_pattern("plain"), "plain");
    }

    #[test]
    fn test_search_pattern_matches_literally() {
        let pattern = regex::Regex::new(&search_pattern(".*")).unwrap();
        assert!(pattern.is_match("the .* token"));
        assert!(!pattern.is_match("anything at all"));
    }
}
