//! Integration tests for the coordinators over an in-memory store.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crease_auction::{AuctionPhase, PassOutcome};
use crease_engine::{InningsSummary, Player, PlayerId, Role, Side};
use crease_protocol::{Mode, Room, RoomCode, SocketId};
use crease_room::{
    AuctionConfig, AuctionCoordinator, AuctionSignal, CodeGenerator, RoomConfig, RoomCoordinator,
    RoomError,
};
use crease_store::{KeyValueStore, MemoryStore, SessionStore, StoreConfig, StoreError};
use crease_tournament::{FixtureOutcome, FixtureResult, Stage, TournamentPhase, TournamentTeam};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn store() -> Arc<SessionStore> {
    Arc::new(SessionStore::in_memory(StoreConfig::default()))
}

fn rooms(store: &Arc<SessionStore>) -> RoomCoordinator {
    RoomCoordinator::new(Arc::clone(store), RoomConfig::default())
}

fn player(id: u32) -> Player {
    Player {
        id: PlayerId(id),
        name: format!("Player {id}"),
        role: Role::Batter,
        batting_average: 35.0,
        strike_rate: 140.0,
        bowling_average: None,
        economy: None,
    }
}

fn innings(team: &str, score: u32) -> InningsSummary {
    InningsSummary {
        team_id: team.to_string(),
        team_name: team.to_uppercase(),
        score,
        wickets: 5,
        balls_bowled: 120,
        allotted_balls: 120,
        all_out: false,
        batsman_stats: vec![],
        bowler_stats: vec![],
    }
}

/// An auction room with four participants on csk, mi, rcb and kkr.
async fn auction_room(rooms: &RoomCoordinator) -> RoomCode {
    let room = rooms.create_room(SocketId(1), "Asha", Mode::Auction).await.unwrap();
    let code = room.code.clone();
    for (socket, name) in [(2, "Ben"), (3, "Chen"), (4, "Dev")] {
        rooms.join_room(SocketId(socket), code.as_str(), name).await.unwrap();
    }
    for (socket, team) in [(1, "csk"), (2, "mi"), (3, "rcb"), (4, "kkr")] {
        rooms
            .select_ipl_team(SocketId(socket), &code, Some(team.into()))
            .await
            .unwrap();
    }
    code
}

fn drain(rx: &mut mpsc::UnboundedReceiver<AuctionSignal>) -> Vec<AuctionSignal> {
    let mut signals = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        signals.push(signal);
    }
    signals
}

// =========================================================================
// Room lifecycle
// =========================================================================

#[tokio::test]
async fn test_create_room_thousand_codes_never_collide() {
    let store = store();
    let rooms = rooms(&store);

    let mut seen = HashSet::new();
    for socket in 0..1000 {
        let room = rooms
            .create_room(SocketId(socket), "Host", Mode::Quick)
            .await
            .unwrap();
        assert_eq!(room.code.as_str().len(), RoomCode::LEN);
        assert!(room.code.as_str().bytes().all(|b| RoomCode::ALPHABET.contains(&b)));
        assert!(seen.insert(room.code.clone()));
    }
    assert_eq!(store.room_codes().await.unwrap().len(), 1000);
}

#[tokio::test]
async fn test_create_room_exhausted_codes_fails() {
    let store = store();
    let first = RoomCoordinator::with_codes(
        Arc::clone(&store),
        RoomConfig::default(),
        CodeGenerator::seeded(9),
    );
    let second = RoomCoordinator::with_codes(
        Arc::clone(&store),
        RoomConfig { code_attempts: 1 },
        CodeGenerator::seeded(9),
    );

    first.create_room(SocketId(1), "A", Mode::Quick).await.unwrap();
    let err = second.create_room(SocketId(2), "B", Mode::Quick).await.unwrap_err();
    assert!(matches!(err, RoomError::CodeExhausted(1)));
    assert!(store.socket_room(SocketId(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_quick_room_full_after_two() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Quick).await.unwrap();

    rooms.join_room(SocketId(2), room.code.as_str(), "B").await.unwrap();
    let err = rooms.join_room(SocketId(3), room.code.as_str(), "C").await.unwrap_err();
    assert!(matches!(err, RoomError::RoomFull(_)));

    let stored = store.room(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 2);
    assert!(store.socket_room(SocketId(3)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_tournament_room_assigns_sides_a_to_j() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(0), "P0", Mode::Tournament).await.unwrap();

    let mut last = room;
    for socket in 1..10 {
        last = rooms
            .join_room(SocketId(socket), last.code.as_str(), &format!("P{socket}"))
            .await
            .unwrap();
    }
    let sides: Vec<Side> = last.players.iter().map(|p| p.side).collect();
    assert_eq!(sides, Side::ALL.to_vec());

    let err = rooms.join_room(SocketId(10), last.code.as_str(), "P10").await.unwrap_err();
    assert!(matches!(err, RoomError::RoomFull(_)));
}

#[tokio::test]
async fn test_join_room_twice_is_idempotent() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Quick).await.unwrap();

    rooms.join_room(SocketId(2), room.code.as_str(), "B").await.unwrap();
    let again = rooms.join_room(SocketId(2), room.code.as_str(), "B").await.unwrap();
    assert_eq!(again.players.len(), 2);
    assert_eq!(again.player(SocketId(2)).unwrap().side, Side::ALL[1]);
}

#[tokio::test]
async fn test_join_missing_room_not_found() {
    let store = store();
    let rooms = rooms(&store);
    let err = rooms.join_room(SocketId(1), "ZZZZZ", "A").await.unwrap_err();
    assert!(matches!(err, RoomError::NotFound(code) if code.as_str() == "ZZZZZ"));
}

#[tokio::test]
async fn test_host_leaves_first_remaining_takes_over() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Tournament).await.unwrap();
    rooms.join_room(SocketId(2), room.code.as_str(), "B").await.unwrap();
    rooms.join_room(SocketId(3), room.code.as_str(), "C").await.unwrap();

    let departure = rooms.leave_room(SocketId(1)).await.unwrap().unwrap();
    assert!(departure.host_changed);
    let after = departure.room.unwrap();
    assert_eq!(after.host_id, SocketId(2));
    assert!(!after.contains(SocketId(1)));
    assert!(store.socket_room(SocketId(1)).await.unwrap().is_none());

    // A rejoin after leaving gets the freed side back.
    let rejoined = rooms.join_room(SocketId(4), room.code.as_str(), "D").await.unwrap();
    assert_eq!(rejoined.player(SocketId(4)).unwrap().side, Side::ALL[0]);
}

#[tokio::test]
async fn test_last_player_leaving_deletes_room() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Quick).await.unwrap();

    let departure = rooms.disconnect(SocketId(1)).await.unwrap().unwrap();
    assert!(departure.room.is_none());
    assert!(!departure.host_changed);
    assert!(!store.room_exists(&room.code).await.unwrap());
}

#[tokio::test]
async fn test_disconnect_twice_is_silent() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Quick).await.unwrap();
    rooms.join_room(SocketId(2), room.code.as_str(), "B").await.unwrap();

    assert!(rooms.disconnect(SocketId(2)).await.unwrap().is_some());
    assert!(rooms.disconnect(SocketId(2)).await.unwrap().is_none());
    assert!(rooms.disconnect(SocketId(99)).await.unwrap().is_none());

    let stored = store.room(&room.code).await.unwrap().unwrap();
    assert_eq!(stored.players.len(), 1);
}

#[tokio::test]
async fn test_select_ipl_team_conflict_and_release() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Quick).await.unwrap();
    rooms.join_room(SocketId(2), room.code.as_str(), "B").await.unwrap();

    rooms
        .select_ipl_team(SocketId(1), &room.code, Some("csk".into()))
        .await
        .unwrap();
    let err = rooms
        .select_ipl_team(SocketId(2), &room.code, Some("csk".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::TeamAlreadyTaken(t) if t == "csk"));

    // Re-selecting your own team is fine.
    rooms
        .select_ipl_team(SocketId(1), &room.code, Some("csk".into()))
        .await
        .unwrap();

    rooms.select_ipl_team(SocketId(1), &room.code, None).await.unwrap();
    let after = rooms
        .select_ipl_team(SocketId(2), &room.code, Some("csk".into()))
        .await
        .unwrap();
    assert_eq!(after.franchises(), vec!["csk".to_string()]);
    assert_eq!(after.player(SocketId(2)).unwrap().ipl_team_id.as_deref(), Some("csk"));
}

#[tokio::test]
async fn test_select_ipl_team_outsider_rejected() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Quick).await.unwrap();
    let err = rooms
        .select_ipl_team(SocketId(7), &room.code, Some("mi".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::NotInRoom(SocketId(7))));
}

// =========================================================================
// Tournament through the coordinator
// =========================================================================

#[tokio::test]
async fn test_tournament_league_to_final_to_complete() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Tournament).await.unwrap();
    let teams = ["a", "b", "c", "d"]
        .iter()
        .map(|id| TournamentTeam::new(id, &id.to_uppercase(), None))
        .collect();
    rooms.set_tournament_teams(&room.code, teams).await.unwrap();

    let snapshot = rooms.generate_fixtures(&room.code).await.unwrap();
    assert_eq!(snapshot.fixtures.len(), 6);
    assert_eq!(snapshot.phase, TournamentPhase::League);

    let mut latest = snapshot.clone();
    for fixture in &snapshot.fixtures {
        latest = rooms
            .complete_fixture(
                &room.code,
                FixtureResult {
                    fixture_id: fixture.id,
                    innings1: innings(&fixture.t1, 170),
                    innings2: innings(&fixture.t2, 150),
                    outcome: FixtureOutcome::Team {
                        id: fixture.t1.clone(),
                    },
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(latest.phase, TournamentPhase::Final);
    let final_fixture = latest.fixtures.iter().find(|f| f.stage == Stage::Final).unwrap();
    assert_eq!((final_fixture.t1.as_str(), final_fixture.t2.as_str()), ("a", "b"));

    let done = rooms
        .complete_fixture(
            &room.code,
            FixtureResult {
                fixture_id: final_fixture.id,
                innings1: innings("a", 160),
                innings2: innings("b", 161),
                outcome: FixtureOutcome::Team { id: "b".into() },
            },
        )
        .await
        .unwrap();
    assert_eq!(done.phase, TournamentPhase::Complete);

    let err = rooms
        .complete_fixture(
            &room.code,
            FixtureResult {
                fixture_id: final_fixture.id,
                innings1: innings("a", 160),
                innings2: innings("b", 161),
                outcome: FixtureOutcome::Team { id: "b".into() },
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RoomError::Tournament(_)));
}

#[tokio::test]
async fn test_generate_fixtures_needs_two_teams() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "A", Mode::Tournament).await.unwrap();
    let err = rooms.generate_fixtures(&room.code).await.unwrap_err();
    assert!(matches!(err, RoomError::Tournament(_)));
}

// =========================================================================
// Auction
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_three_bids_then_passes_all_passed_before_expiry() {
    let store = store();
    let rooms = rooms(&store);
    let code = auction_room(&rooms).await;
    let (auction, mut rx) = AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());

    auction.start(&code).await.unwrap();
    let state = auction.next_player(&code, player(1), 20).await.unwrap();
    assert_eq!(state.phase, AuctionPhase::Bidding);
    assert_eq!(state.current_bid, 20);
    assert!(auction.is_counting(&code));

    auction.place_bid(&code, "csk", "CSK", 25).await.unwrap();
    auction.place_bid(&code, "mi", "MI", 30).await.unwrap();
    auction.place_bid(&code, "rcb", "RCB", 35).await.unwrap();

    assert_eq!(auction.pass(&code, "csk").await.unwrap().outcome, PassOutcome::Recorded);
    assert_eq!(auction.pass(&code, "mi").await.unwrap().outcome, PassOutcome::Recorded);
    let last = auction.pass(&code, "kkr").await.unwrap();
    let PassOutcome::AllPassed { leader } = last.outcome else {
        panic!("expected all passed, got {:?}", last.outcome);
    };
    assert_eq!(leader.unwrap().team_id, "rcb");
    assert!(!auction.is_counting(&code));

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(
        drain(&mut rx)
            .iter()
            .all(|s| !matches!(s, AuctionSignal::TimerExpired { .. }))
    );

    let state = auction.sold(&code).await.unwrap();
    assert_eq!(state.phase, AuctionPhase::Sold);
    assert_eq!(state.sold_players[0].team_id, "rcb");
    assert_eq!(state.sold_players[0].price, 35);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_down_then_expires() {
    let store = store();
    let rooms = rooms(&store);
    let code = auction_room(&rooms).await;
    let (auction, mut rx) = AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());

    auction.start(&code).await.unwrap();
    auction.next_player(&code, player(1), 20).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;

    let signals = drain(&mut rx);
    let timers: Vec<u32> = signals
        .iter()
        .filter_map(|s| match s {
            AuctionSignal::TimerUpdate { timer, .. } => Some(*timer),
            _ => None,
        })
        .collect();
    assert_eq!(timers, (1..=9).rev().collect::<Vec<_>>());
    assert_eq!(
        signals.last(),
        Some(&AuctionSignal::TimerExpired {
            code: code.clone(),
            round: 1
        })
    );
    assert!(!auction.is_counting(&code));

    let stored = store.room(&code).await.unwrap().unwrap();
    assert_eq!(stored.auction_state.unwrap().timer, 0);

    let state = auction.unsold(&code).await.unwrap();
    assert_eq!(state.unsold_players.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bid_resets_clock() {
    let store = store();
    let rooms = rooms(&store);
    let code = auction_room(&rooms).await;
    let (auction, mut rx) = AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());

    auction.start(&code).await.unwrap();
    auction.next_player(&code, player(1), 20).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(store.room(&code).await.unwrap().unwrap().auction_state.unwrap().timer, 5);

    let state = auction.place_bid(&code, "mi", "MI", 20).await.unwrap();
    assert_eq!(state.timer, 10);
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    let stored = store.room(&code).await.unwrap().unwrap().auction_state.unwrap();
    assert_eq!(stored.timer, 5);
    assert!(
        drain(&mut rx)
            .iter()
            .all(|s| !matches!(s, AuctionSignal::TimerExpired { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_bid_outside_bidding_rejected_without_write() {
    let store = store();
    let rooms = rooms(&store);
    let code = auction_room(&rooms).await;
    let (auction, _rx) = AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());

    auction.start(&code).await.unwrap();
    let before = store.room(&code).await.unwrap().unwrap();
    let err = auction.place_bid(&code, "csk", "CSK", 50).await.unwrap_err();
    assert!(matches!(err, RoomError::Auction(_)));
    assert_eq!(store.room(&code).await.unwrap().unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn test_room_deleted_mid_round_stops_countdown() {
    let store = store();
    let rooms = rooms(&store);
    let room = rooms.create_room(SocketId(1), "Solo", Mode::Auction).await.unwrap();
    let (auction, mut rx) = AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());

    auction.start(&room.code).await.unwrap();
    auction.next_player(&room.code, player(1), 20).await.unwrap();
    rooms.leave_room(SocketId(1)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!auction.is_counting(&room.code));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_recover_countdowns_resumes_from_deadline() {
    let store = store();
    let rooms = rooms(&store);
    let code = auction_room(&rooms).await;
    {
        let (auction, _rx) =
            AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());
        auction.start(&code).await.unwrap();
        auction.next_player(&code, player(1), 20).await.unwrap();
        // Dropping the coordinator kills the clock, as a restart would.
    }

    let (auction, mut rx) = AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());
    assert_eq!(auction.recover_countdowns().await.unwrap(), 1);
    assert!(auction.is_counting(&code));

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let signals = drain(&mut rx);
    assert!(matches!(
        signals.last(),
        Some(AuctionSignal::TimerExpired { round: 1, .. })
    ));
}

#[tokio::test]
async fn test_complete_closes_auction() {
    let store = store();
    let rooms = rooms(&store);
    let code = auction_room(&rooms).await;
    let (auction, _rx) = AuctionCoordinator::new(Arc::clone(&store), AuctionConfig::default());

    auction.start(&code).await.unwrap();
    auction.next_player(&code, player(1), 20).await.unwrap();
    assert!(matches!(
        auction.complete(&code).await.unwrap_err(),
        RoomError::Auction(_)
    ));
    auction.unsold(&code).await.unwrap();
    let state = auction.complete(&code).await.unwrap();
    assert_eq!(state.phase, AuctionPhase::Closed);
    assert!(!auction.is_counting(&code));
}

// =========================================================================
// Store failure
// =========================================================================

struct DownStore;

impl KeyValueStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn keys(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn purge_expired(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn test_store_down_surfaces_store_error() {
    let store = Arc::new(SessionStore::new(DownStore, StoreConfig::default()));
    let rooms = RoomCoordinator::new(Arc::clone(&store), RoomConfig::default());

    let err = rooms.create_room(SocketId(1), "A", Mode::Quick).await.unwrap_err();
    assert!(matches!(err, RoomError::Store(StoreError::Unavailable(_))));

    let err = rooms.join_room(SocketId(1), "ABCDE", "A").await.unwrap_err();
    assert!(matches!(err, RoomError::Store(StoreError::Unavailable(_))));

    let err = rooms.leave_room(SocketId(1)).await.unwrap_err();
    assert!(matches!(err, RoomError::Store(_)));

    let (auction, _rx) = AuctionCoordinator::new(store, AuctionConfig::default());
    assert!(auction.recover_countdowns().await.is_err());
}

/// A memory store whose `room:` writes can be switched off mid-test.
struct FlakyRoomWrites {
    inner: MemoryStore,
    failing: Arc<AtomicBool>,
}

impl FlakyRoomWrites {
    fn check(&self, key: &str) -> Result<(), StoreError> {
        if key.starts_with("room:") && self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write timed out".into()));
        }
        Ok(())
    }
}

impl KeyValueStore for FlakyRoomWrites {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(prefix).await
    }

    async fn purge_expired(&self) -> usize {
        self.inner.purge_expired().await
    }
}

#[tokio::test]
async fn test_leave_room_failed_write_keeps_socket_index() {
    let failing = Arc::new(AtomicBool::new(false));
    let backend = FlakyRoomWrites {
        inner: MemoryStore::new(),
        failing: Arc::clone(&failing),
    };
    let store = Arc::new(SessionStore::new(backend, StoreConfig::default()));
    let rooms = RoomCoordinator::new(Arc::clone(&store), RoomConfig::default());

    let room = rooms.create_room(SocketId(1), "Asha", Mode::Quick).await.unwrap();
    rooms.join_room(SocketId(2), room.code.as_str(), "Ben").await.unwrap();

    failing.store(true, Ordering::SeqCst);
    let err = rooms.leave_room(SocketId(2)).await.unwrap_err();
    assert!(matches!(err, RoomError::Store(StoreError::Unavailable(_))));

    // Still listed in the room, so still indexed.
    assert_eq!(rooms.room_of(SocketId(2)).await.unwrap(), room.code);
    let stored = rooms.ensure_room(&room.code).await.unwrap();
    assert!(stored.player(SocketId(2)).is_some());

    failing.store(false, Ordering::SeqCst);
    let departure = rooms.leave_room(SocketId(2)).await.unwrap().unwrap();
    assert_eq!(departure.player.socket_id, SocketId(2));
    assert!(matches!(
        rooms.room_of(SocketId(2)).await.unwrap_err(),
        RoomError::NotInRoom(_)
    ));
}

#[test]
fn test_room_is_send_and_sync_for_sharing() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RoomCoordinator>();
    assert_send_sync::<AuctionCoordinator>();
    assert_send_sync::<Room>();
}
