use portier_core::UserId;

use crate::error::IdentityError;
use crate::store::IdentityStore;

/// Run the identity store conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty store;
/// nothing may have been allocated yet.
///
/// # Errors
///
/// Returns an error if a store operation fails unexpectedly.
pub async fn run_store_conformance_tests(store: &dyn IdentityStore) -> Result<(), IdentityError> {
    test_find_missing(store).await?;
    test_allocate_increases(store).await?;
    test_create_and_find(store).await?;
    test_duplicate_name_conflicts(store).await?;
    test_distinct_users(store).await?;
    Ok(())
}

async fn test_find_missing(store: &dyn IdentityStore) -> Result<(), IdentityError> {
    let by_name = store.find_by_name("conformance-missing").await?;
    assert!(by_name.is_none(), "find_by_name on unknown user should return None");

    let by_id = store.find_by_id(UserId::FIRST).await?;
    assert!(by_id.is_none(), "find_by_id on unknown id should return None");
    Ok(())
}

async fn test_allocate_increases(store: &dyn IdentityStore) -> Result<(), IdentityError> {
    let first = store.allocate().await?;
    let second = store.allocate().await?;
    assert!(second > first, "allocate should hand out increasing ids");
    Ok(())
}

async fn test_create_and_find(store: &dyn IdentityStore) -> Result<(), IdentityError> {
    let id = store.allocate().await?;
    let account = store.create_record(id, "conformance-alice").await?;
    assert_eq!(account.id, id);
    assert_eq!(account.username, "conformance-alice");

    let by_name = store.find_by_name("conformance-alice").await?;
    assert_eq!(by_name.as_ref(), Some(&account), "find_by_name after create");

    let by_id = store.find_by_id(id).await?;
    assert_eq!(by_id.as_ref(), Some(&account), "find_by_id after create");
    Ok(())
}

async fn test_duplicate_name_conflicts(store: &dyn IdentityStore) -> Result<(), IdentityError> {
    let id = store.allocate().await?;
    store.create_record(id, "conformance-dup").await?;

    let other = store.allocate().await?;
    let result = store.create_record(other, "conformance-dup").await;
    assert!(
        matches!(result, Err(IdentityError::Conflict(_))),
        "creating an existing name should conflict, got {result:?}"
    );

    let kept = store.find_by_name("conformance-dup").await?;
    assert_eq!(kept.map(|a| a.id), Some(id), "original record should remain");
    assert!(
        store.find_by_id(other).await?.is_none(),
        "rejected create should not write the id"
    );
    Ok(())
}

async fn test_distinct_users(store: &dyn IdentityStore) -> Result<(), IdentityError> {
    let a = store.allocate().await?;
    let b = store.allocate().await?;
    store.create_record(a, "conformance-a").await?;
    store.create_record(b, "conformance-b").await?;

    let found_a = store.find_by_id(a).await?.map(|u| u.username);
    let found_b = store.find_by_id(b).await?.map(|u| u.username);
    assert_eq!(found_a.as_deref(), Some("conformance-a"));
    assert_eq!(found_b.as_deref(), Some("conformance-b"));
    Ok(())
}
