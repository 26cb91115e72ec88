use std::collections::BTreeMap;

use trustroot_store::{
    decode_entries, Error, InMemoryStore, JsonPatch, PatchOperation, StoreAccessor, StoreAction,
    StoreRef, StoreVerb, SyncOutcome,
};

const ENTRY: &str = r#"{"tlogs":[{"baseUrl":"https://rekor.example.com","hashAlgorithm":"SHA2_256","publicKey":{"rawBytes":"AAEC"},"logId":{"keyId":"AwQF"}}]}"#;
const OTHER_ENTRY: &str = r#"{"ctlogs":[{"hashAlgorithm":"SHA2_512","publicKey":{"rawBytes":"BgcI"},"logId":{"keyId":"CQoL"}}]}"#;
const ENTRY_WITH_WHITESPACE: &str = r#"{ "tlogs": [ { "logId": {"keyId": "AwQF"},
    "publicKey": {"rawBytes": "AAEC"}, "baseUrl": "https://rekor.example.com" } ] }"#;

fn keys() -> StoreRef {
    StoreRef::new("cosign-system", "config-sigstore-keys")
}

fn entries(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_sync_creates_missing_store() {
    let store = InMemoryStore::new();
    let accessor = StoreAccessor::new(store.clone());

    let outcome = accessor
        .sync_entry(&keys(), "tr", ENTRY_WITH_WHITESPACE)
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Created);
    assert_eq!(store.entries(&keys()).await, Some(entries(&[("tr", ENTRY)])));
}

#[tokio::test]
async fn test_sync_unchanged_entry_sends_no_patch() {
    let store = InMemoryStore::new();
    store
        .insert_resource(&keys(), entries(&[("tr", ENTRY_WITH_WHITESPACE)]))
        .await;
    let accessor = StoreAccessor::new(store.clone());

    let outcome = accessor.sync_entry(&keys(), "tr", ENTRY).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert!(store.patches().await.is_empty());
}

#[tokio::test]
async fn test_sync_replaces_different_entry() {
    let store = InMemoryStore::new();
    store
        .insert_resource(&keys(), entries(&[("tr", OTHER_ENTRY), ("other", OTHER_ENTRY)]))
        .await;
    let accessor = StoreAccessor::new(store.clone());

    let outcome = accessor.sync_entry(&keys(), "tr", ENTRY).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Patched(PatchOperation::replace("tr", ENTRY)));
    assert_eq!(
        store.patches().await,
        vec![JsonPatch::single(PatchOperation::replace("tr", ENTRY))]
    );
    assert_eq!(
        store.entries(&keys()).await,
        Some(entries(&[("tr", ENTRY), ("other", OTHER_ENTRY)]))
    );
}

#[tokio::test]
async fn test_sync_adds_entry_to_existing_store() {
    let store = InMemoryStore::new();
    store
        .insert_resource(&keys(), entries(&[("other", OTHER_ENTRY)]))
        .await;
    let accessor = StoreAccessor::new(store.clone());

    let outcome = accessor.sync_entry(&keys(), "tr", ENTRY).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Patched(PatchOperation::add("tr", ENTRY)));
}

#[tokio::test]
async fn test_sync_retries_conflicts_with_fresh_read() {
    let store = InMemoryStore::new();
    store.insert_resource(&keys(), BTreeMap::new()).await;
    store.conflict_next(2).await;
    let accessor = StoreAccessor::new(store.clone());

    let outcome = accessor.sync_entry(&keys(), "tr", ENTRY).await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Patched(_)));

    let reads = store
        .actions()
        .await
        .into_iter()
        .filter(|a| matches!(a, StoreAction::Get(_)))
        .count();
    assert_eq!(reads, 3);
    assert_eq!(store.patches().await.len(), 3);
}

#[tokio::test]
async fn test_sync_gives_up_after_retry_budget() {
    let store = InMemoryStore::new();
    store.insert_resource(&keys(), BTreeMap::new()).await;
    store.conflict_next(10).await;
    let accessor = StoreAccessor::new(store.clone()).with_conflict_retries(1);

    let err = accessor.sync_entry(&keys(), "tr", ENTRY).await.unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    assert_eq!(store.patches().await.len(), 2);
}

#[tokio::test]
async fn test_sync_surfaces_transport_failure() {
    let store = InMemoryStore::new();
    store
        .insert_resource(&keys(), entries(&[("tr", OTHER_ENTRY)]))
        .await;
    store
        .fail_on(StoreVerb::Patch, "inducing failure for patch configmaps")
        .await;
    let accessor = StoreAccessor::new(store.clone());

    let err = accessor.sync_entry(&keys(), "tr", ENTRY).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "inducing failure for patch configmaps");
    assert_eq!(
        store.entries(&keys()).await,
        Some(entries(&[("tr", OTHER_ENTRY)]))
    );
}

#[tokio::test]
async fn test_remove_entry() {
    let store = InMemoryStore::new();
    store
        .insert_resource(&keys(), entries(&[("tr1", ENTRY), ("tr2", OTHER_ENTRY)]))
        .await;
    let accessor = StoreAccessor::new(store.clone());

    let outcome = accessor.remove_entry(&keys(), "tr2").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Patched(PatchOperation::remove("tr2")));
    assert_eq!(
        store.patches().await[0].to_json().unwrap(),
        r#"[{"op":"remove","path":"/data/tr2"}]"#
    );
    assert_eq!(store.entries(&keys()).await, Some(entries(&[("tr1", ENTRY)])));

    // already absent
    let outcome = accessor.remove_entry(&keys(), "tr2").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert_eq!(store.patches().await.len(), 1);
}

#[tokio::test]
async fn test_remove_from_missing_store() {
    let accessor = StoreAccessor::new(InMemoryStore::new());
    let outcome = accessor.remove_entry(&keys(), "tr").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Unchanged);
}

#[tokio::test]
async fn test_ensure_created_is_idempotent() {
    let store = InMemoryStore::new();
    let accessor = StoreAccessor::new(store.clone());

    let first = accessor
        .ensure_created(&keys(), entries(&[("tr", ENTRY)]))
        .await
        .unwrap();
    let second = accessor
        .ensure_created(&keys(), BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(accessor.get_entries(&keys()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_entries_of_missing_store() {
    let accessor = StoreAccessor::new(InMemoryStore::new());
    assert!(matches!(
        accessor.get_entries(&keys()).await,
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn test_decode_entries() {
    let decoded = decode_entries(&entries(&[("tr1", ENTRY), ("tr2", OTHER_ENTRY)])).unwrap();
    assert_eq!(decoded["tr1"].tlogs.len(), 1);
    assert_eq!(decoded["tr2"].ctlogs.len(), 1);

    let err = decode_entries(&entries(&[("broken", "{")])).unwrap_err();
    assert!(err.to_string().contains("entry broken"));
}
