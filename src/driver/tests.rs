//! Tests for the extraction driver

use super::*;
use crate::engine::fakes::{
    connection_lost, maintenance, transaction, RecordingSleeper, Reply, ScriptedGateway,
};
use crate::engine::FixedClock;
use crate::error::Error;
use crate::model::{decode_record, Entity, EntityKind};
use crate::output::MemorySink;
use crate::streams::find_stream;
use crate::types::SyncPolicy;
use chrono::TimeZone;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

/// Full history from March 1st, daily windows
fn config() -> TapConfig {
    let mut config = TapConfig::new("merchant", "pub", "priv", "2024-03-01T00:00:00Z");
    config.sync_state = SyncPolicy::Full;
    config
}

fn driver(
    gateway: &Arc<ScriptedGateway>,
    sleeper: &Arc<RecordingSleeper>,
    config: TapConfig,
    state: StateManager,
    now: DateTime<Utc>,
) -> ExtractionDriver {
    ExtractionDriver::new(gateway.clone(), config, state)
        .with_sleeper(sleeper.clone())
        .with_clock(Arc::new(FixedClock(now)))
}

fn customer(id: &str, created_at: &str, updated_at: &str) -> Entity {
    decode_record(
        EntityKind::Customer,
        &json!({"id": id, "created_at": created_at, "updated_at": updated_at}),
    )
    .unwrap()
}

fn emitted_ids(sink: &MemorySink, stream: &str) -> Vec<String> {
    sink.records(stream)
        .iter()
        .filter_map(|r| r.get_str("id").map(str::to_string))
        .collect()
}

// ============================================================================
// End to End
// ============================================================================

#[tokio::test]
async fn test_abandoned_window_does_not_stop_the_run() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        Reply::Fail(connection_lost()),
        Reply::Records(vec![transaction(
            "t2",
            "2024-03-02T05:00:00Z",
            "2024-03-02T05:00:00Z",
        )]),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = StateManager::in_memory();
    let mut driver = driver(&gateway, &sleeper, config(), state.clone(), at(3, 0));
    let mut sink = MemorySink::new();

    let stream = find_stream("transactions").unwrap();
    let stats = driver.sync_stream(stream, &mut sink).await.unwrap();

    assert_eq!(emitted_ids(&sink, "transactions"), vec!["t2"]);
    assert_eq!(stats.records_synced, 1);
    assert_eq!(stats.windows_completed, 1);
    assert_eq!(stats.windows_abandoned, 1);

    let saved = state.stream_state("transactions").await;
    assert_eq!(saved.bookmark, Some(at(2, 5)));
    assert_eq!(saved.watermark, Some(at(2, 5)));
    assert!(saved.incomplete_windows.is_empty());

    let last = sink.messages().last().unwrap();
    assert!(last.is_state());
    assert_eq!(
        sink.states("transactions"),
        vec![&json!({
            "bookmark": "2024-03-02T05:00:00Z",
            "watermark": "2024-03-02T05:00:00Z"
        })]
    );
}

#[tokio::test]
async fn test_records_are_stamped_with_clock_time() {
    let gateway = Arc::new(ScriptedGateway::new(vec![Reply::Records(vec![
        transaction("t1", "2024-03-01T05:00:00Z", "2024-03-01T05:00:00Z"),
    ])]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut driver = driver(
        &gateway,
        &sleeper,
        config(),
        StateManager::in_memory(),
        at(2, 0),
    );
    let mut sink = MemorySink::new();

    driver
        .sync_stream(find_stream("transactions").unwrap(), &mut sink)
        .await
        .unwrap();

    match &sink.messages()[0] {
        Message::Record { emitted_at, .. } => {
            assert_eq!(*emitted_at, at(2, 0).timestamp_millis());
        }
        other => panic!("expected a record, got {other:?}"),
    }
}

#[tokio::test]
async fn test_maintenance_waits_without_losing_records() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        Reply::Fail(maintenance()),
        Reply::Fail(maintenance()),
        Reply::Records(vec![
            transaction("t1", "2024-03-01T05:00:00Z", "2024-03-01T05:00:00Z"),
            transaction("t2", "2024-03-01T06:00:00Z", "2024-03-01T06:00:00Z"),
        ]),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut driver = driver(
        &gateway,
        &sleeper,
        config(),
        StateManager::in_memory(),
        at(2, 0),
    );
    let mut sink = MemorySink::new();

    let stats = driver
        .sync_stream(find_stream("transactions").unwrap(), &mut sink)
        .await
        .unwrap();

    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_secs(3600), Duration::from_secs(3600)]
    );
    assert_eq!(emitted_ids(&sink, "transactions"), vec!["t1", "t2"]);
    assert_eq!(stats.maintenance_outages, 2);
}

#[tokio::test]
async fn test_maintenance_backoff_comes_from_config() {
    let gateway = Arc::new(ScriptedGateway::new(vec![Reply::Fail(maintenance())]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut config = config();
    config.maintenance_backoff_secs = 5;
    let mut driver = driver(
        &gateway,
        &sleeper,
        config,
        StateManager::in_memory(),
        at(2, 0),
    );

    driver
        .sync_stream(find_stream("transactions").unwrap(), &mut MemorySink::new())
        .await
        .unwrap();

    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn test_fatal_error_leaves_state_untouched() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        Reply::Records(vec![transaction(
            "t1",
            "2024-03-01T05:00:00Z",
            "2024-03-01T05:00:00Z",
        )]),
        Reply::Fail(Error::http_status(401, "Unauthorized")),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = StateManager::in_memory();
    let mut driver = driver(&gateway, &sleeper, config(), state.clone(), at(3, 0));
    let mut sink = MemorySink::new();

    let result = driver
        .sync_stream(find_stream("transactions").unwrap(), &mut sink)
        .await;

    assert!(matches!(result, Err(Error::HttpStatus { status: 401, .. })));
    assert_eq!(emitted_ids(&sink, "transactions"), vec!["t1"]);
    assert!(sink.states("transactions").is_empty());
    assert_eq!(state.stream_state("transactions").await, StreamState::default());
    assert_eq!(driver.stats().streams_synced, 0);
}

// ============================================================================
// Range And Watermark
// ============================================================================

#[tokio::test]
async fn test_bookmark_is_next_range_start() {
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = StateManager::from_json(
        r#"{"streams": {"customers": {"bookmark": "2024-03-05T12:00:00Z"}}}"#,
    )
    .unwrap();
    let mut driver = driver(&gateway, &sleeper, config(), state, at(6, 0));

    driver
        .sync_stream(find_stream("customers").unwrap(), &mut MemorySink::new())
        .await
        .unwrap();

    assert_eq!(
        gateway.calls(),
        vec![Some(Window::new(at(5, 12), at(6, 0)))]
    );
}

#[tokio::test]
async fn test_streams_without_replication_key_ignore_bookmark() {
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = StateManager::from_json(
        r#"{"streams": {"subscriptions": {"bookmark": "2024-03-05T12:00:00Z"}}}"#,
    )
    .unwrap();
    let mut config = config();
    config.sync_state = SyncPolicy::Regular;
    let now = Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap();
    let mut driver = driver(&gateway, &sleeper, config, state.clone(), now);

    let stream = find_stream("subscriptions").unwrap();
    let bounds = driver
        .bounds(stream, &state.stream_state("subscriptions").await)
        .unwrap();
    assert_eq!(bounds.start, at(10, 0));
    assert_eq!(bounds.end, now);
    assert_eq!(bounds.watermark, at(10, 0));

    driver
        .sync_stream(stream, &mut MemorySink::new())
        .await
        .unwrap();
    assert_eq!(gateway.calls().len(), 31);
    assert_eq!(gateway.calls()[0], Some(Window::new(at(10, 0), at(11, 0))));
}

#[tokio::test]
async fn test_config_watermark_filters_old_changes() {
    let gateway = Arc::new(ScriptedGateway::new(vec![Reply::Records(vec![
        customer("c1", "2024-03-01T05:00:00Z", "2024-03-01T05:00:00Z"),
        customer("c2", "2024-03-01T06:00:00Z", "2024-03-02T10:00:00Z"),
    ])]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut config = config();
    config.watermark = Some("2024-03-02".into());
    config.fetch_records_interval_hours = 48;
    let state = StateManager::in_memory();
    let mut driver = driver(&gateway, &sleeper, config, state.clone(), at(3, 0));
    let mut sink = MemorySink::new();

    driver
        .sync_stream(find_stream("customers").unwrap(), &mut sink)
        .await
        .unwrap();

    assert_eq!(emitted_ids(&sink, "customers"), vec!["c2"]);
    let saved = state.stream_state("customers").await;
    assert_eq!(saved.bookmark, Some(at(1, 6)));
    assert_eq!(saved.watermark, Some(at(2, 10)));
}

#[tokio::test]
async fn test_saved_watermark_wins_over_config() {
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut config = config();
    config.watermark = Some("2024-01-01".into());
    let state = StateManager::from_json(
        r#"{"streams": {"customers": {"watermark": "2024-03-04T00:00:00Z"}}}"#,
    )
    .unwrap();
    let driver = driver(&gateway, &sleeper, config, state.clone(), at(6, 0));

    let bounds = driver
        .bounds(
            find_stream("customers").unwrap(),
            &state.stream_state("customers").await,
        )
        .unwrap();
    assert_eq!(bounds.start, at(1, 0));
    assert_eq!(bounds.watermark, at(4, 0));
}

#[tokio::test]
async fn test_invalid_start_date_is_an_error() {
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let config = TapConfig::new("merchant", "pub", "priv", "not a date");
    let mut driver = driver(
        &gateway,
        &sleeper,
        config,
        StateManager::in_memory(),
        at(2, 0),
    );

    let result = driver
        .sync_stream(find_stream("customers").unwrap(), &mut MemorySink::new())
        .await;
    assert!(matches!(result, Err(Error::InvalidConfigValue { .. })));
    assert!(gateway.calls().is_empty());
}

// ============================================================================
// Abandoned Windows
// ============================================================================

#[tokio::test]
async fn test_requeued_window_is_fetched_first_next_run() {
    let mut config = config();
    config.abandoned_windows = AbandonedWindowPolicy::Requeue;
    let state = StateManager::in_memory();
    let sleeper = Arc::new(RecordingSleeper::default());

    let first = Arc::new(ScriptedGateway::new(vec![
        Reply::Fail(connection_lost()),
        Reply::Records(vec![transaction(
            "t2",
            "2024-03-02T05:00:00Z",
            "2024-03-02T05:00:00Z",
        )]),
    ]));
    let mut run = driver(&first, &sleeper, config.clone(), state.clone(), at(3, 0));
    run.sync_stream(find_stream("transactions").unwrap(), &mut MemorySink::new())
        .await
        .unwrap();

    let saved = state.stream_state("transactions").await;
    assert_eq!(saved.incomplete_windows, vec![Window::new(at(1, 0), at(2, 0))]);
    assert_eq!(saved.bookmark, Some(at(2, 5)));
    assert_eq!(saved.watermark, None);

    let second = Arc::new(ScriptedGateway::new(vec![Reply::Records(vec![
        transaction("t1", "2024-03-01T05:00:00Z", "2024-03-01T05:00:00Z"),
    ])]));
    let mut run = driver(&second, &sleeper, config, state.clone(), at(3, 6));
    let mut sink = MemorySink::new();
    run.sync_stream(find_stream("transactions").unwrap(), &mut sink)
        .await
        .unwrap();

    assert_eq!(
        second.calls(),
        vec![
            Some(Window::new(at(1, 0), at(2, 0))),
            Some(Window::new(at(2, 5), at(3, 5))),
            Some(Window::new(at(3, 5), at(3, 6))),
        ]
    );
    assert_eq!(emitted_ids(&sink, "transactions"), vec!["t1"]);

    let saved = state.stream_state("transactions").await;
    assert!(saved.incomplete_windows.is_empty());
    assert_eq!(saved.bookmark, Some(at(2, 5)));
    assert_eq!(saved.watermark, Some(at(1, 5)));
}

#[tokio::test]
async fn test_dropped_windows_are_not_persisted() {
    let gateway = Arc::new(ScriptedGateway::new(vec![Reply::FailAfter(
        vec![transaction("t1", "2024-03-01T05:00:00Z", "2024-03-01T05:00:00Z")],
        connection_lost(),
    )]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = StateManager::in_memory();
    let mut driver = driver(&gateway, &sleeper, config(), state.clone(), at(2, 0));
    let mut sink = MemorySink::new();

    let stats = driver
        .sync_stream(find_stream("transactions").unwrap(), &mut sink)
        .await
        .unwrap();

    assert_eq!(emitted_ids(&sink, "transactions"), vec!["t1"]);
    assert_eq!(stats.windows_abandoned, 1);
    let saved = state.stream_state("transactions").await;
    assert!(saved.incomplete_windows.is_empty());
    assert_eq!(saved.watermark, Some(at(1, 5)));
}

// ============================================================================
// Full Enumeration And Persistence
// ============================================================================

#[tokio::test]
async fn test_plans_enumerate_everything_once() {
    let plan = decode_record(
        EntityKind::Plan,
        &json!({"id": "basic", "price": "9.99", "updated_at": "2019-01-01T00:00:00Z"}),
    )
    .unwrap();
    let gateway = Arc::new(ScriptedGateway::new(vec![Reply::Records(vec![plan])]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let state = StateManager::in_memory();
    let mut driver = driver(&gateway, &sleeper, config(), state.clone(), at(10, 0));
    let mut sink = MemorySink::new();

    driver
        .sync_stream(find_stream("plans").unwrap(), &mut sink)
        .await
        .unwrap();

    assert_eq!(gateway.calls(), vec![None]);
    assert_eq!(emitted_ids(&sink, "plans"), vec!["basic"]);
    assert_eq!(state.stream_state("plans").await.bookmark, None);
}

#[tokio::test]
async fn test_stats_accumulate_across_streams() {
    let gateway = Arc::new(ScriptedGateway::new(vec![
        Reply::Records(vec![transaction(
            "t1",
            "2024-03-01T05:00:00Z",
            "2024-03-01T05:00:00Z",
        )]),
        Reply::Records(vec![customer(
            "c1",
            "2024-03-01T05:00:00Z",
            "2024-03-01T05:00:00Z",
        )]),
    ]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut driver = driver(
        &gateway,
        &sleeper,
        config(),
        StateManager::in_memory(),
        at(2, 0),
    );
    let mut sink = MemorySink::new();

    for name in ["transactions", "customers"] {
        driver
            .sync_stream(find_stream(name).unwrap(), &mut sink)
            .await
            .unwrap();
    }

    let stats = driver.stats();
    assert_eq!(stats.streams_synced, 2);
    assert_eq!(stats.records_synced, 2);
    assert_eq!(stats.windows_completed, 2);
}

#[tokio::test]
async fn test_state_is_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let gateway = Arc::new(ScriptedGateway::new(vec![Reply::Records(vec![
        customer("c1", "2024-03-01T05:00:00Z", "2024-03-01T07:00:00Z"),
    ])]));
    let sleeper = Arc::new(RecordingSleeper::default());
    let mut driver = driver(
        &gateway,
        &sleeper,
        config(),
        StateManager::new(&path),
        at(2, 0),
    );

    driver
        .sync_stream(find_stream("customers").unwrap(), &mut MemorySink::new())
        .await
        .unwrap();

    let reloaded = StateManager::from_file(&path).unwrap();
    assert_eq!(reloaded.get_bookmark("customers").await, Some(at(1, 5)));
    assert_eq!(reloaded.get_watermark("customers").await, Some(at(1, 7)));
}
