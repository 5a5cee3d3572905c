// tests/event_lifecycle.rs
mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use matchday_notifier::format::GOALS_NOT_AVAILABLE;
use matchday_notifier::{run_once, DedupStore, FotMobSource};
use serde_json::{json, Value};

use common::{config, RecordingNotifier};

fn kickoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 14, 15, 0, 0).unwrap()
}

fn snapshot(status: Value) -> Value {
    json!({
        "fixtures": { "allFixtures": { "fixtures": [{
            "id": 5001,
            "home": { "id": 9001, "name": "Hashtag United" },
            "away": { "id": 9002, "name": "Opponent" },
            "tournament": { "name": "League" },
            "roundName": "Round 1",
            "status": status
        }]}}
    })
}

fn not_started() -> Value {
    json!({ "utcTime": "2026-02-14T15:00:00Z", "started": false, "finished": false, "cancelled": false })
}

fn live(score: &str) -> Value {
    json!({ "utcTime": "2026-02-14T15:00:00Z", "started": true, "finished": false, "cancelled": false,
            "scoreStr": score, "reason": { "short": "", "long": "" } })
}

fn half_time(score: &str) -> Value {
    json!({ "utcTime": "2026-02-14T15:00:00Z", "started": true, "finished": false, "cancelled": false,
            "scoreStr": score, "reason": { "short": "HT", "long": "Half-Time" } })
}

fn full_time(score: &str) -> Value {
    json!({ "utcTime": "2026-02-14T15:00:00Z", "started": true, "finished": true, "cancelled": false,
            "scoreStr": score, "reason": { "short": "FT", "long": "Full-Time" } })
}

fn details(goals: &[(u16, &str)]) -> Value {
    let shots: Vec<Value> = goals
        .iter()
        .map(|(min, who)| json!({ "eventType": "Goal", "min": min, "playerName": who, "teamId": 9001 }))
        .collect();
    json!({
        "general": { "homeTeam": { "id": 9001 } },
        "content": { "shotmap": { "shots": shots } }
    })
}

async fn run(
    payload: Value,
    details: Option<Value>,
    at: DateTime<Utc>,
    store: &mut DedupStore,
) -> RecordingNotifier {
    let mut source = FotMobSource::from_fixture(&payload.to_string());
    if let Some(d) = details {
        source = source.with_details("5001", &d.to_string());
    }
    let notifier = RecordingNotifier::default();
    run_once(&config(), &source, &notifier, store, at)
        .await
        .expect("run ok");
    notifier
}

#[tokio::test]
async fn full_lifecycle_posts_each_event_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posted_events.json");
    let mut store = DedupStore::open(&path).unwrap();
    let k = kickoff();

    let n = run(snapshot(not_started()), None, k - Duration::minutes(60), &mut store).await;
    assert_eq!(n.ids(), ["5001:prematch"]);
    assert!(n.contents()[0].contains("Match soon"));

    let n = run(snapshot(not_started()), None, k - Duration::minutes(55), &mut store).await;
    assert!(n.ids().is_empty(), "second prematch run must be silent");

    let n = run(snapshot(live("0 - 0")), None, k + Duration::minutes(10), &mut store).await;
    assert_eq!(n.ids(), ["5001:live"]);

    let n = run(
        snapshot(live("1 - 0")),
        Some(details(&[(30, "Player A")])),
        k + Duration::minutes(35),
        &mut store,
    )
    .await;
    assert_eq!(n.ids(), ["5001:goal:30-home-player-a-0"]);
    let goal = &n.contents()[0];
    assert!(goal.contains("30' GOAL"));
    assert!(goal.contains("Scorer: Player A"));
    assert!(goal.contains("Hashtag United 1-0 Opponent"));

    let n = run(
        snapshot(half_time("1 - 0")),
        Some(details(&[(30, "Player A")])),
        k + Duration::minutes(50),
        &mut store,
    )
    .await;
    assert_eq!(n.ids(), ["5001:halftime"]);

    let n = run(
        snapshot(full_time("2 - 0")),
        Some(details(&[(30, "Player A"), (70, "Player B")])),
        k + Duration::minutes(115),
        &mut store,
    )
    .await;
    assert_eq!(n.ids(), ["5001:goal:70-home-player-b-0", "5001:fulltime"]);
    let ft = &n.contents()[1];
    assert!(ft.contains("Final score: 2-0"));
    assert!(ft.contains("30' Player A (Home)"));
    assert!(ft.contains("70' Player B (Home)"));

    // process restart: everything comes back from disk
    let mut reopened = DedupStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 6);
    let n = run(
        snapshot(full_time("2 - 0")),
        Some(details(&[(30, "Player A"), (70, "Player B")])),
        k + Duration::minutes(120),
        &mut reopened,
    )
    .await;
    assert!(n.ids().is_empty());
}

#[tokio::test]
async fn first_sighting_mid_match_orders_live_before_goals() {
    let mut store = DedupStore::in_memory();
    let n = run(
        snapshot(live("2 - 0")),
        Some(details(&[(40, "Late"), (12, "Early")])),
        kickoff() + Duration::minutes(45),
        &mut store,
    )
    .await;
    assert_eq!(
        n.ids(),
        ["5001:live", "5001:goal:12-home-early-0", "5001:goal:40-home-late-0"]
    );
}

#[tokio::test]
async fn status_flapping_back_to_live_posts_nothing() {
    let mut store = DedupStore::in_memory();
    let d = details(&[(20, "Player A")]);
    run(snapshot(half_time("1 - 0")), Some(d.clone()), kickoff() + Duration::minutes(50), &mut store).await;

    let n = run(snapshot(live("1 - 0")), Some(d), kickoff() + Duration::minutes(52), &mut store).await;
    assert!(n.ids().is_empty());
}

#[tokio::test]
async fn cancellation_is_terminal() {
    let mut store = DedupStore::in_memory();
    let cancelled = json!({ "utcTime": "2026-02-14T15:00:00Z", "started": false, "finished": false, "cancelled": true });
    let n = run(snapshot(cancelled), None, kickoff() - Duration::minutes(30), &mut store).await;
    assert_eq!(n.ids(), ["5001:cancelled"]);
    assert!(n.contents()[0].contains("Cancelled"));

    // the source changes its mind; we don't
    let n = run(snapshot(not_started()), None, kickoff() - Duration::minutes(20), &mut store).await;
    assert!(n.ids().is_empty());
}

#[tokio::test]
async fn missing_goal_data_renders_marker_instead_of_empty_list() {
    let mut store = DedupStore::in_memory();
    let n = run(snapshot(full_time("1 - 1")), None, kickoff() + Duration::minutes(115), &mut store).await;
    assert_eq!(n.ids(), ["5001:fulltime"]);
    assert!(n.contents()[0].contains(GOALS_NOT_AVAILABLE));
}

#[tokio::test]
async fn goalless_draw_without_details_is_known_empty() {
    let mut store = DedupStore::in_memory();
    let n = run(snapshot(full_time("0 - 0")), None, kickoff() + Duration::minutes(115), &mut store).await;
    assert!(n.contents()[0].contains("⚽ Goals: none"));
}

#[tokio::test]
async fn fixture_with_only_kickoff_time_gets_prematch_post() {
    let payload = json!({
        "fixtures": { "allFixtures": { "fixtures": [{ "match": {
            "id": 7001,
            "home": { "id": 9001, "name": "Hashtag United" },
            "away": { "id": 9002, "name": "Opponent" },
            "status": { "utcTime": "2026-02-14T15:00:00Z" }
        }}]}}
    });
    let mut store = DedupStore::in_memory();
    let n = run(payload, None, kickoff() - Duration::minutes(60), &mut store).await;
    assert_eq!(n.ids(), ["7001:prematch"]);
    assert!(n.contents()[0].contains("Match soon"));
}
