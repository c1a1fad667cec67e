use roster_snapshot::{
    Endpoint, EndpointFetcher, EndpointPayload, EntityKind, EntryStatus, EpochState, FetchError,
    Language, League, Player, PromotionPolicy, ReferenceBatch, RetryPolicy, SingletonRow, Team,
};
use roster_snapshot_store::{SnapshotStore, StoreError, SyncOptions};
use tokio::sync::Notify;

/// Serves one endpoint, but only after the test releases it.
struct GatedFetcher {
    endpoint: Endpoint,
    payload: EndpointPayload,
    started: Notify,
    release: Notify,
}

impl GatedFetcher {
    fn new(endpoint: Endpoint, payload: EndpointPayload) -> Self {
        Self {
            endpoint,
            payload,
            started: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait::async_trait]
impl EndpointFetcher for GatedFetcher {
    fn label(&self) -> &str {
        "gated"
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        vec![self.endpoint.clone()]
    }

    async fn fetch(&self, _endpoint: &Endpoint) -> Result<EndpointPayload, FetchError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.payload.clone())
    }
}

fn options(auto_promote: bool) -> SyncOptions {
    SyncOptions {
        retry: RetryPolicy::immediate(1),
        concurrency: 2,
        auto_promote,
        promotion: PromotionPolicy::default(),
    }
}

fn league_payload(id: i64, name: &str) -> EndpointPayload {
    EndpointPayload::default().with_reference(ReferenceBatch::Leagues(vec![League {
        id,
        name: name.to_owned(),
        country_id: None,
        short_name: None,
        continent: None,
        season: None,
        season_offset: None,
        match_round: None,
        zone_name: None,
        english_name: None,
        language_id: None,
        national_team_id: None,
        active_teams: None,
        active_users: None,
        number_of_levels: None,
    }]))
}

fn worlddetails() -> Endpoint {
    Endpoint::new("worlddetails", "1.9")
}

fn team() -> Team {
    Team {
        id: 55,
        user_id: None,
        name: "Hammarby IF".to_owned(),
        short_name: None,
        founded_date: None,
        arena_id: None,
        arena_name: None,
        league_id: None,
        league_name: None,
        country_id: None,
        country_name: None,
        region_id: None,
        region_name: None,
        cup_id: None,
        cup_name: None,
        logo_url: None,
        is_bot: None,
    }
}

fn player(form: i64) -> Player {
    Player {
        id: 1,
        team_id: 55,
        first_name: "Erik".to_owned(),
        nick_name: None,
        last_name: "Larsson".to_owned(),
        player_number: None,
        age: 24,
        age_days: None,
        tsi: 3_400,
        form,
        experience: 4,
        loyalty: 12,
        leadership: 3,
        salary: 2_500,
        specialty: None,
        country_id: None,
        injury_level: None,
        transfer_listed: false,
        stamina_skill: None,
        keeper_skill: None,
        playmaker_skill: None,
        scorer_skill: None,
        passing_skill: None,
        winger_skill: None,
        defender_skill: None,
        set_pieces_skill: None,
    }
}

#[tokio::test]
async fn simultaneous_downloads_stay_in_their_own_epochs() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let first = GatedFetcher::new(worlddetails(), league_payload(10, "Allsvenskan"));
    let second = GatedFetcher::new(worlddetails(), league_payload(20, "Eliteserien"));
    let opts = options(false);

    let (a, b, ()) = tokio::join!(
        store.run_download(&first, &opts),
        store.run_download(&second, &opts),
        async {
            first.started.notified().await;
            second.started.notified().await;
            let open = store.list_epochs().unwrap();
            assert_eq!(open.len(), 2);
            for id in &open {
                assert!(store.is_claimed(*id).unwrap());
            }
            first.release.notify_one();
            second.release.notify_one();
        }
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.download_id, b.download_id);
    assert_eq!(a.state, EpochState::Complete);
    assert_eq!(b.state, EpochState::Complete);
    assert_eq!(store.reference_ids(EntityKind::League, a.download_id).unwrap(), vec![10]);
    assert_eq!(store.reference_ids(EntityKind::League, b.download_id).unwrap(), vec![20]);
    for id in [a.download_id, b.download_id] {
        let entries = store.list_entries(id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Succeeded);
        assert!(!store.is_claimed(id).unwrap());
    }
    assert_eq!(store.current_epoch().unwrap(), None);
}

#[tokio::test]
async fn epoch_in_flight_refuses_discard_retire_and_promote() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let fetcher = GatedFetcher::new(worlddetails(), league_payload(10, "Allsvenskan"));
    let opts = options(true);

    let (report, ()) = tokio::join!(store.run_download(&fetcher, &opts), async {
        fetcher.started.notified().await;
        let id = store.list_epochs().unwrap()[0];

        assert!(matches!(store.discard_epoch(id), Err(StoreError::Concurrency(_))));
        assert!(matches!(store.retire_epoch(id), Err(StoreError::Concurrency(_))));
        assert!(matches!(
            store.promote(id, &PromotionPolicy::default()),
            Err(StoreError::Concurrency(_))
        ));
        assert!(matches!(store.claim_epoch(id), Err(StoreError::Concurrency(_))));
        assert_eq!(store.epoch_state(id).unwrap(), EpochState::Open);

        fetcher.release.notify_one();
    });
    let report = report.unwrap();

    assert_eq!(report.state, EpochState::Promoted);
    assert_eq!(store.current_epoch().unwrap(), Some(report.download_id));
    assert!(!store.is_claimed(report.download_id).unwrap());
}

#[test]
fn concurrent_singleton_upserts_leave_one_row() {
    let store = SnapshotStore::open_in_memory().unwrap();
    store.upsert_singleton(&SingletonRow::Team(team())).unwrap();

    std::thread::scope(|scope| {
        for form in 0..8 {
            let store = &store;
            scope.spawn(move || {
                for _ in 0..50 {
                    store
                        .upsert_singleton(&SingletonRow::Player(player(form)))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(store.players_for_team(55).unwrap().len(), 1);
    let form = store.player(1).unwrap().unwrap().form;
    assert!((0..8).contains(&form));
}

#[test]
fn concurrent_identical_batches_insert_once() {
    let store = SnapshotStore::open_in_memory().unwrap();
    let id = store.begin_epoch().unwrap();
    let batch = ReferenceBatch::Languages(vec![Language {
        id: 1,
        name: "Svenska".to_owned(),
    }]);

    let inserted: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| store.write_reference_batch(id, &batch).unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().inserted)
            .sum()
    });

    assert_eq!(inserted, 1);
    assert_eq!(store.reference_ids(EntityKind::Language, id).unwrap(), vec![1]);
}
