// Integration tests for account creation and starter-profile bootstrap.
mod common;

use profile_service::domain::models::{AccountRole, ProfileKind, VisibilityStatus};
use profile_service::error::ServiceError;
use profile_service::services::{AccountService, NewAccount, ProfileService};
use serial_test::serial;

fn new_account(display_name: &str) -> NewAccount {
    NewAccount {
        email: format!("{}@example.com", common::unique("boot")),
        handle: common::unique("boot"),
        display_name: display_name.to_string(),
        password_hash: "argon2-hash-from-auth-layer".to_string(),
        role: AccountRole::User,
    }
}

#[tokio::test]
#[serial]
async fn test_bootstrap_provisions_public_and_anonymous_profiles() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let profiles = ProfileService::new(pool.clone());
    let accounts = AccountService::new(pool.clone(), profiles.clone());

    let account = accounts.create_account(new_account("Ana")).await.unwrap();

    let listed = profiles.list_by_account(account.id).await.unwrap();
    assert_eq!(listed.len(), 2);

    // default first: the public profile named after the account
    let public = &listed[0];
    assert_eq!(public.profile_name, "Ana");
    assert!(public.is_default);
    assert_eq!(public.kind, ProfileKind::Public);
    assert_eq!(public.visibility, VisibilityStatus::Public);

    let anonymous = &listed[1];
    let pattern = regex::Regex::new(r"^Anon\d{6}$").unwrap();
    assert!(
        pattern.is_match(&anonymous.profile_name),
        "unexpected anonymous name: {}",
        anonymous.profile_name
    );
    assert!(!anonymous.is_default);
    assert_eq!(anonymous.kind, ProfileKind::Anonymous);
    assert_eq!(anonymous.visibility, VisibilityStatus::Private);

    let default = profiles.get_default(account.id).await.unwrap();
    assert_eq!(default.id, public.id);
}

#[tokio::test]
#[serial]
async fn test_duplicate_email_conflicts() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let profiles = ProfileService::new(pool.clone());
    let accounts = AccountService::new(pool.clone(), profiles);

    let mut first = new_account("Ana");
    first.email = format!("{}@example.com", common::unique("dup"));
    let mut second = new_account("Bea");
    second.email = first.email.clone();

    accounts.create_account(first).await.unwrap();
    let err = accounts.create_account(second).await.unwrap_err();
    assert!(matches!(err, ServiceError::AccountExists(_)));
}

#[tokio::test]
#[serial]
async fn test_account_without_profiles_has_no_default() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let profiles = ProfileService::new(pool.clone());

    // the partially-failed-bootstrap terminal state: account row, no profiles
    let account_id = common::create_bare_account(&pool).await;

    let err = profiles.get_default(account_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::ProfileNotFound));
    assert!(profiles.list_by_account(account_id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_find_account_roundtrip() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let profiles = ProfileService::new(pool.clone());
    let accounts = AccountService::new(pool.clone(), profiles);

    let created = accounts.create_account(new_account("Cai")).await.unwrap();

    let found = accounts.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(found.email, created.email);
    assert_eq!(found.role, AccountRole::User);

    let by_email = accounts
        .find_by_email(&created.email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, created.id);

    assert!(accounts
        .find_by_id(uuid::Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}
