// Integration tests for the engagement state machine and content layer.
//
// The membership tables are the source of truth; every test cross-checks
// the cached counters against the actual set cardinality.
mod common;

use async_trait::async_trait;
use profile_service::domain::models::{ContentKind, ReactionKind};
use profile_service::error::ServiceError;
use profile_service::services::{
    CategoryCounters, ContentFilter, ContentService, EngagementService, NewContentItem,
    NewProfile, ProfileService,
};
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

struct Fixture {
    content: ContentService,
    engagement: EngagementService,
    profile_id: Uuid,
}

async fn fixture(pool: PgPool) -> Fixture {
    let profiles = ProfileService::new(pool.clone());
    let engagement = EngagementService::new(pool.clone());
    let content = ContentService::new(pool.clone(), engagement.clone());

    let account_id = common::create_bare_account(&pool).await;
    let profile = profiles
        .create_profile(NewProfile::public(account_id, "author"))
        .await
        .unwrap();

    Fixture {
        content,
        engagement,
        profile_id: profile.id,
    }
}

async fn new_item(fx: &Fixture, kind: ContentKind) -> Uuid {
    fx.content
        .create(NewContentItem {
            profile_id: fx.profile_id,
            category_id: Uuid::new_v4(),
            kind,
            title: "Borrow checker basics".to_string(),
            body: "How do lifetimes work?".to_string(),
            tags: vec!["rust".to_string(), "lifetimes".to_string()],
        })
        .await
        .unwrap()
        .id
}

/// Counter columns must always equal the membership-set cardinality
async fn assert_counters_match_sets(pool: &PgPool, content_id: Uuid) {
    let (likes, dislikes, saves, shares): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT like_count, dislike_count, save_count, share_count
        FROM content_items WHERE id = $1
        "#,
    )
    .bind(content_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let (set_likes, set_dislikes, set_saves, set_shares): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM content_reactions WHERE content_id = $1 AND reaction = 'like'),
            (SELECT COUNT(*) FROM content_reactions WHERE content_id = $1 AND reaction = 'dislike'),
            (SELECT COUNT(*) FROM content_saves WHERE content_id = $1),
            (SELECT COUNT(*) FROM content_shares WHERE content_id = $1)
        "#,
    )
    .bind(content_id)
    .fetch_one(pool)
    .await
    .unwrap();

    assert_eq!(likes, set_likes);
    assert_eq!(dislikes, set_dislikes);
    assert_eq!(saves, set_saves);
    assert_eq!(shares, set_shares);
}

#[tokio::test]
#[serial]
async fn test_like_then_dislike_flips_atomically() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let item = new_item(&fx, ContentKind::Post).await;

    fx.engagement.like(item, fx.profile_id).await.unwrap();
    fx.engagement.dislike(item, fx.profile_id).await.unwrap();

    let counts = fx.engagement.counts(item).await.unwrap();
    assert_eq!(counts.like_count, 0);
    assert_eq!(counts.dislike_count, 1);

    let state = fx
        .engagement
        .engagement_state(item, fx.profile_id)
        .await
        .unwrap();
    assert_eq!(state.reaction, Some(ReactionKind::Dislike));

    assert_counters_match_sets(&pool, item).await;
}

#[tokio::test]
#[serial]
async fn test_like_and_save_are_idempotent() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let item = new_item(&fx, ContentKind::Post).await;

    fx.engagement.like(item, fx.profile_id).await.unwrap();
    fx.engagement.like(item, fx.profile_id).await.unwrap();
    fx.engagement.save(item, fx.profile_id).await.unwrap();
    fx.engagement.save(item, fx.profile_id).await.unwrap();

    let counts = fx.engagement.counts(item).await.unwrap();
    assert_eq!(counts.like_count, 1);
    assert_eq!(counts.save_count, 1);

    assert_counters_match_sets(&pool, item).await;
}

#[tokio::test]
#[serial]
async fn test_removing_absent_reactions_is_a_noop() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let item = new_item(&fx, ContentKind::Post).await;

    fx.engagement.unlike(item, fx.profile_id).await.unwrap();
    fx.engagement
        .remove_dislike(item, fx.profile_id)
        .await
        .unwrap();
    fx.engagement.unsave(item, fx.profile_id).await.unwrap();

    let counts = fx.engagement.counts(item).await.unwrap();
    assert_eq!(counts.like_count, 0);
    assert_eq!(counts.dislike_count, 0);
    assert_eq!(counts.save_count, 0);

    assert_counters_match_sets(&pool, item).await;
}

#[tokio::test]
#[serial]
async fn test_save_is_independent_of_reaction_axis() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let item = new_item(&fx, ContentKind::Question).await;

    fx.engagement.save(item, fx.profile_id).await.unwrap();
    fx.engagement.like(item, fx.profile_id).await.unwrap();
    fx.engagement.dislike(item, fx.profile_id).await.unwrap();
    fx.engagement.unlike(item, fx.profile_id).await.unwrap();

    let state = fx
        .engagement
        .engagement_state(item, fx.profile_id)
        .await
        .unwrap();
    assert!(state.saved);
    assert_eq!(state.reaction, Some(ReactionKind::Dislike));

    assert_counters_match_sets(&pool, item).await;
}

#[tokio::test]
#[serial]
async fn test_share_is_monotonic() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let item = new_item(&fx, ContentKind::Post).await;

    fx.engagement.share(item, fx.profile_id).await.unwrap();
    fx.engagement.share(item, fx.profile_id).await.unwrap();

    let counts = fx.engagement.counts(item).await.unwrap();
    assert_eq!(counts.share_count, 1);

    let state = fx
        .engagement
        .engagement_state(item, fx.profile_id)
        .await
        .unwrap();
    assert!(state.shared);

    assert_counters_match_sets(&pool, item).await;
}

#[tokio::test]
#[serial]
async fn test_missing_content_is_the_only_error() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let missing = Uuid::new_v4();

    for result in [
        fx.engagement.like(missing, fx.profile_id).await,
        fx.engagement.unlike(missing, fx.profile_id).await,
        fx.engagement.dislike(missing, fx.profile_id).await,
        fx.engagement.remove_dislike(missing, fx.profile_id).await,
        fx.engagement.save(missing, fx.profile_id).await,
        fx.engagement.unsave(missing, fx.profile_id).await,
        fx.engagement.share(missing, fx.profile_id).await,
    ] {
        assert!(matches!(result.unwrap_err(), ServiceError::ContentNotFound));
    }
}

#[tokio::test]
#[serial]
async fn test_two_profiles_track_separately() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let item = new_item(&fx, ContentKind::Post).await;

    let profiles = ProfileService::new(pool.clone());
    let other = profiles
        .create_profile(NewProfile::public(
            common::create_bare_account(&pool).await,
            "reader",
        ))
        .await
        .unwrap();

    fx.engagement.like(item, fx.profile_id).await.unwrap();
    fx.engagement.dislike(item, other.id).await.unwrap();

    let counts = fx.engagement.counts(item).await.unwrap();
    assert_eq!(counts.like_count, 1);
    assert_eq!(counts.dislike_count, 1);

    assert_counters_match_sets(&pool, item).await;
}

// ========== Content layer ==========

struct FailingCounters;

#[async_trait]
impl CategoryCounters for FailingCounters {
    async fn adjust_count(&self, _: Uuid, _: i64, _: i64) -> anyhow::Result<()> {
        anyhow::bail!("counter store offline")
    }
}

#[tokio::test]
#[serial]
async fn test_content_creation_survives_failing_counter_store() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;

    let content = ContentService::with_category_counters(
        pool.clone(),
        EngagementService::new(pool.clone()),
        Arc::new(FailingCounters),
    );

    let created = content
        .create(NewContentItem {
            profile_id: fx.profile_id,
            category_id: Uuid::new_v4(),
            kind: ContentKind::Question,
            title: "Counter outage".to_string(),
            body: "still persists".to_string(),
            tags: vec![],
        })
        .await
        .unwrap();

    assert!(content.find_by_id(created.id).await.unwrap().is_some());
    content.delete(created.id).await.unwrap();
    assert!(content.find_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_search_treats_metacharacters_literally() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;

    let category_id = Uuid::new_v4();
    fx.content
        .create(NewContentItem {
            profile_id: fx.profile_id,
            category_id,
            kind: ContentKind::Post,
            title: "Why C++ beats C".to_string(),
            body: "opinions inside".to_string(),
            tags: vec!["c++".to_string()],
        })
        .await
        .unwrap();
    fx.content
        .create(NewContentItem {
            profile_id: fx.profile_id,
            category_id,
            kind: ContentKind::Post,
            title: "Cooking carbonara".to_string(),
            body: "no programming here".to_string(),
            tags: vec!["food".to_string()],
        })
        .await
        .unwrap();

    // "c++" must not be interpreted as a pattern (which would also hit "Cooking")
    let hits = fx
        .content
        .search(ContentFilter {
            category_id: Some(category_id),
            search: Some("c++".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Why C++ beats C");
}

#[tokio::test]
#[serial]
async fn test_search_matches_title_body_and_tags() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;
    let category_id = Uuid::new_v4();

    for (title, body, tag) in [
        ("Lifetimes explained", "plain text", "intro"),
        ("Second post", "all about lifetimes", "intro"),
        ("Third post", "plain text", "lifetimes"),
        ("Unrelated", "plain text", "intro"),
    ] {
        fx.content
            .create(NewContentItem {
                profile_id: fx.profile_id,
                category_id,
                kind: ContentKind::Post,
                title: title.to_string(),
                body: body.to_string(),
                tags: vec![tag.to_string()],
            })
            .await
            .unwrap();
    }

    let hits = fx
        .content
        .search(ContentFilter {
            category_id: Some(category_id),
            search: Some("LIFETIMES".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(hits.len(), 3);
}

#[tokio::test]
#[serial]
async fn test_delete_missing_content_not_found() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let fx = fixture(pool.clone()).await;

    let err = fx.content.delete(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::ContentNotFound));
}
