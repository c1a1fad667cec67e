use roster_snapshot::{
    AttemptOutcome, Country, DownloadId, Endpoint, EntityKind, EpochState, League,
    PromotionPolicy, ReferenceBatch,
};
use roster_snapshot_store::{SnapshotStore, StoreError};

fn league(id: i64, name: &str, country_id: i64) -> League {
    League {
        id,
        name: name.to_owned(),
        country_id: Some(country_id),
        short_name: None,
        continent: Some("Europe".to_owned()),
        season: Some(88),
        season_offset: None,
        match_round: Some(3),
        zone_name: None,
        english_name: None,
        language_id: None,
        national_team_id: None,
        active_teams: None,
        active_users: None,
        number_of_levels: None,
    }
}

fn country(id: i64, name: &str, code: &str) -> Country {
    Country {
        id,
        name: name.to_owned(),
        currency_id: None,
        country_code: Some(code.to_owned()),
        date_format: None,
        time_format: None,
        flag: None,
    }
}

fn fill(store: &SnapshotStore, id: DownloadId) {
    store
        .write_reference_batch(
            id,
            &ReferenceBatch::Countries(vec![country(1, "Sweden", "SE"), country(2, "Norway", "NO")]),
        )
        .unwrap();
    store
        .write_reference_batch(
            id,
            &ReferenceBatch::Leagues(vec![
                league(10, "Allsvenskan", 1),
                league(11, "Superettan", 1),
                league(20, "Eliteserien", 2),
            ]),
        )
        .unwrap();
    store.write_attachment(5, id, b"avatar").unwrap();
    store
        .record_attempt(id, &Endpoint::new("worlddetails", "1"), &AttemptOutcome::Succeeded)
        .unwrap();
}

/// Allocate epochs until the next one has id `target`, discarding and
/// deleting the fillers.
fn advance_to(store: &SnapshotStore, target: i64) {
    loop {
        let id = store.begin_epoch().unwrap();
        if id.get() + 1 >= target {
            store.discard_epoch(id).unwrap();
            store.retire_epoch(id).unwrap();
            return;
        }
        store.discard_epoch(id).unwrap();
        store.retire_epoch(id).unwrap();
    }
}

#[test]
fn retiring_an_epoch_cascades_to_every_row() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let keep = store.begin_epoch().unwrap();
    let doomed = store.begin_epoch().unwrap();
    fill(&store, keep);
    fill(&store, doomed);

    let kept_rows = store.epoch_row_count(keep).unwrap();
    assert!(store.epoch_row_count(doomed).unwrap() > 0);

    store.discard_epoch(doomed).unwrap();
    store.retire_epoch(doomed).unwrap();

    assert_eq!(store.epoch_row_count(doomed).unwrap(), 0);
    assert_eq!(store.epoch_row_count(keep).unwrap(), kept_rows);
    assert!(store.avatars_for_player(5).unwrap().iter().all(|(id, _)| *id == keep));
    assert!(matches!(
        store.epoch_state(doomed),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn promoting_seven_then_retiring_six() {
    let store = SnapshotStore::open_in_memory().unwrap();
    advance_to(&store, 6);

    let six = store.begin_epoch().unwrap();
    assert_eq!(six, DownloadId::new(6));
    fill(&store, six);
    store.promote(six, &PromotionPolicy::default()).unwrap();

    let seven = store.begin_epoch().unwrap();
    assert_eq!(seven, DownloadId::new(7));
    fill(&store, seven);

    let report = store.promote(seven, &PromotionPolicy::default()).unwrap();
    assert_eq!(report.superseded, Some(six));
    assert_eq!(store.current_epoch().unwrap(), Some(seven));

    store.retire_epoch(six).unwrap();

    assert!(store.reference_ids(EntityKind::League, six).unwrap().is_empty());
    assert_eq!(
        store.reference_ids(EntityKind::League, seven).unwrap(),
        vec![10, 11, 20]
    );
    assert_eq!(store.reference_ids(EntityKind::Country, seven).unwrap(), vec![1, 2]);
}

#[test]
fn current_epoch_cannot_be_retired() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let id = store.begin_epoch().unwrap();
    fill(&store, id);
    store.promote(id, &PromotionPolicy::default()).unwrap();

    assert!(matches!(
        store.retire_epoch(id),
        Err(StoreError::Concurrency(_))
    ));
    assert!(matches!(
        store.discard_epoch(id),
        Err(StoreError::Concurrency(_))
    ));
    assert_eq!(store.current_epoch().unwrap(), Some(id));
}

#[test]
fn promoted_epoch_rejects_writes() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let id = store.begin_epoch().unwrap();
    fill(&store, id);
    store.promote(id, &PromotionPolicy::default()).unwrap();

    let result = store.write_reference_batch(
        id,
        &ReferenceBatch::Leagues(vec![league(30, "Late", 1)]),
    );
    assert!(matches!(result, Err(StoreError::Concurrency(_))));
    assert!(matches!(
        store.write_attachment(6, id, b"late"),
        Err(StoreError::Concurrency(_))
    ));
    assert!(matches!(
        store.claim_epoch(id),
        Err(StoreError::Concurrency(_))
    ));
}

#[test]
fn epochs_can_be_filled_side_by_side() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let a = store.begin_epoch().unwrap();
    let b = store.begin_epoch().unwrap();
    let _claim_a = store.claim_epoch(a).unwrap();
    let _claim_b = store.claim_epoch(b).unwrap();

    fill(&store, a);
    fill(&store, b);

    assert_eq!(store.completeness(a).unwrap(), EpochState::Complete);
    assert_eq!(store.completeness(b).unwrap(), EpochState::Complete);
    assert_eq!(store.list_epochs().unwrap(), vec![a, b]);
}
