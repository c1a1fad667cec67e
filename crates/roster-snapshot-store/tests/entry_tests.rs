use roster_snapshot::{AttemptOutcome, DownloadId, Endpoint, EntryStatus, EpochState};
use roster_snapshot_store::{SnapshotStore, StoreError};

fn store_with_epoch() -> (SnapshotStore, DownloadId) {
    let store = SnapshotStore::open_in_memory().unwrap();
    let id = store.begin_epoch().unwrap();
    (store, id)
}

#[test]
fn teams_endpoint_recovers_on_third_attempt() {
    let (store, id) = store_with_epoch();
    let teams = Endpoint::new("teams", "2");
    store.register_endpoints(id, &[teams.clone()]).unwrap();

    store
        .record_attempt(id, &teams, &AttemptOutcome::failed("connection reset"))
        .unwrap();
    assert_eq!(store.next_retryable(id, 3).unwrap(), vec![teams.clone()]);

    store
        .record_attempt(id, &teams, &AttemptOutcome::failed("timed out"))
        .unwrap();
    assert_eq!(store.next_retryable(id, 3).unwrap(), vec![teams.clone()]);

    let entry = store
        .record_attempt(id, &teams, &AttemptOutcome::Succeeded)
        .unwrap();
    assert_eq!(entry.status, EntryStatus::Succeeded);
    assert_eq!(entry.retry_count, 2);
    assert_eq!(entry.error_message, None);

    assert!(store.next_retryable(id, 3).unwrap().is_empty());
    assert_eq!(store.completeness(id).unwrap(), EpochState::Complete);
}

#[test]
fn exhausted_entry_is_listed_but_not_retried() {
    let (store, id) = store_with_epoch();
    let players = Endpoint::new("players", "2");
    let leagues = Endpoint::new("leagues", "1");
    store
        .register_endpoints(id, &[players.clone(), leagues.clone()])
        .unwrap();
    store
        .record_attempt(id, &leagues, &AttemptOutcome::Succeeded)
        .unwrap();

    for _ in 0..3 {
        store
            .record_attempt(id, &players, &AttemptOutcome::failed("503"))
            .unwrap();
    }

    assert!(store.next_retryable(id, 3).unwrap().is_empty());
    assert!(store.next_retryable(id, 3).unwrap().is_empty());

    let entries = store.list_entries(id).unwrap();
    let exhausted = entries.iter().find(|e| e.endpoint == "players").unwrap();
    assert_eq!(exhausted.status, EntryStatus::Exhausted);
    assert_eq!(exhausted.retry_count, 3);
    assert_eq!(exhausted.error_message.as_deref(), Some("503"));
    assert_eq!(store.completeness(id).unwrap(), EpochState::Partial);
}

#[test]
fn optional_endpoint_failure_does_not_block_completion() {
    let (store, id) = store_with_epoch();
    let required = Endpoint::new("worlddetails", "1");
    let avatars = Endpoint::new("avatars", "1").optional();
    store
        .register_endpoints(id, &[required.clone(), avatars.clone()])
        .unwrap();

    store
        .record_attempt(id, &required, &AttemptOutcome::Succeeded)
        .unwrap();
    store
        .record_attempt(id, &avatars, &AttemptOutcome::failed("not found"))
        .unwrap();
    assert_eq!(store.completeness(id).unwrap(), EpochState::Open);

    store.next_retryable(id, 1).unwrap();
    assert_eq!(store.completeness(id).unwrap(), EpochState::Complete);
}

#[test]
fn attempts_are_scoped_per_epoch() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let first = store.begin_epoch().unwrap();
    let second = store.begin_epoch().unwrap();
    let teams = Endpoint::new("teams", "2").for_user(42);

    store
        .record_attempt(first, &teams, &AttemptOutcome::failed("boom"))
        .unwrap();
    store
        .record_attempt(second, &teams, &AttemptOutcome::Succeeded)
        .unwrap();

    assert_eq!(store.next_retryable(first, 3).unwrap(), vec![teams.clone()]);
    assert!(store.next_retryable(second, 3).unwrap().is_empty());
    assert_eq!(store.list_entries(second).unwrap()[0].user_id, Some(42));
}

#[test]
fn unknown_epoch_is_reported() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let missing = DownloadId::new(9);

    assert!(matches!(
        store.list_entries(missing),
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.record_attempt(missing, &Endpoint::new("teams", "2"), &AttemptOutcome::Succeeded),
        Err(StoreError::Integrity(_))
    ));
}

#[test]
fn epoch_without_entries_stays_open() {
    let (store, id) = store_with_epoch();
    assert_eq!(store.completeness(id).unwrap(), EpochState::Open);
    assert_eq!(store.evaluate_epoch(id).unwrap(), EpochState::Open);
}
