//! Integration tests for the session monitor facade
//!
//! Exercises the inbound contract end to end: registration with
//! auto-tracking, status transitions, completion signals, stats, and
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use taskwatch::{
    ClientId, ClientKind, ClientStatus, CompletionTrigger, MonitorEvent, MonitorOptions,
    NewClient, SessionMonitor,
};

fn quiet_options() -> MonitorOptions {
    let _ = env_logger::builder().is_test(true).try_init();
    MonitorOptions::builder()
        .auto_track(false)
        .sweep_interval(Duration::from_secs(3600))
        .build()
}

fn client(id: &str) -> NewClient {
    NewClient::new(id, format!("client {id}"), ClientKind::GeneralCliAgent)
}

#[tokio::test]
async fn register_with_auto_tracking_arms_detection() {
    let _ = env_logger::builder().is_test(true).try_init();
    let monitor = SessionMonitor::new(MonitorOptions::builder().auto_track(true).build());

    let entity = monitor.register_client(client("a")).await.unwrap();
    assert_eq!(entity.status, ClientStatus::Connected);

    let stats = monitor.get_stats().await;
    assert_eq!(stats.active_clients, 1);
    assert_eq!(stats.tracking_sessions, 1);

    monitor.shutdown().await;
}

#[tokio::test]
async fn manual_completion_updates_entity_and_emits_event() {
    let monitor = SessionMonitor::new(quiet_options());

    let completions = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&completions);
    monitor.bus().subscribe("probe", move |event: &MonitorEvent| {
        if let MonitorEvent::TaskCompleted(completion) = event {
            sink.lock().push(completion.clone());
        }
        Ok(())
    });

    let entity = monitor
        .register_client(client("a").current_task("ship the feature"))
        .await
        .unwrap();
    monitor.start_tracking(&entity.id).await.unwrap();

    monitor.apply_transition(&entity.id, ClientStatus::Running).await;
    assert!(monitor.mark_task_completed(&entity.id, Some("ci green".into())).await);

    // Running -> Completed was applied by the detector.
    let fetched = monitor.get_client(&entity.id).await.unwrap();
    assert_eq!(fetched.status, ClientStatus::Completed);

    let record = fetched.context.last_completed_task.expect("task record");
    assert_eq!(record.trigger, CompletionTrigger::Manual);
    assert_eq!(record.description.as_deref(), Some("ship the feature"));
    assert!(fetched.context.current_task.is_none());

    assert_eq!(completions.lock().len(), 1);

    // The episode is closed; a second signal changes nothing.
    assert!(!monitor.mark_task_completed(&entity.id, None).await);
    assert_eq!(completions.lock().len(), 1);

    monitor.shutdown().await;
}

#[tokio::test]
async fn disconnect_transition_removes_client_and_stops_tracking() {
    let monitor = SessionMonitor::new(quiet_options());

    let entity = monitor.register_client(client("a")).await.unwrap();
    monitor.start_tracking(&entity.id).await.unwrap();

    monitor.apply_transition(&entity.id, ClientStatus::Idle).await.unwrap();
    let change = monitor
        .apply_transition(&entity.id, ClientStatus::Disconnected)
        .await
        .unwrap();
    assert_eq!(change.from, ClientStatus::Idle);

    assert!(monitor.list_active().await.is_empty());
    assert!(monitor.get_client(&entity.id).await.is_none());

    let stats = monitor.get_stats().await;
    assert_eq!(stats.tracking_sessions, 0);
    assert_eq!(stats.history_entries, 1);

    // Idle detection never fires for the removed client.
    assert!(!monitor.mark_task_completed(&entity.id, None).await);

    monitor.shutdown().await;
}

#[tokio::test]
async fn invalid_transitions_are_contained() {
    let monitor = SessionMonitor::new(quiet_options());

    let entity = monitor.register_client(client("a")).await.unwrap();

    // Running -> Disconnected is not in the table; the client survives a
    // malformed message sequence untouched.
    monitor.apply_transition(&entity.id, ClientStatus::Running).await.unwrap();
    assert!(
        monitor
            .apply_transition(&entity.id, ClientStatus::Disconnected)
            .await
            .is_none()
    );
    assert_eq!(
        monitor.get_client(&entity.id).await.unwrap().status,
        ClientStatus::Running
    );

    monitor.shutdown().await;
}

#[tokio::test]
async fn request_counters_feed_activity_into_tracking() {
    let monitor = SessionMonitor::new(quiet_options());

    let completions = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&completions);
    monitor.bus().subscribe("probe", move |event: &MonitorEvent| {
        if let MonitorEvent::TaskCompleted(completion) = event {
            sink.lock().push(completion.clone());
        }
        Ok(())
    });

    let entity = monitor.register_client(client("a")).await.unwrap();
    monitor
        .start_tracking_with(
            &entity.id,
            taskwatch::TrackingConfig::default()
                .idle_timeout(Duration::from_millis(400))
                .monitor_file_changes(false),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    monitor.increment_request(&entity.id).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(completions.lock().is_empty(), "request should reset the idle timer");

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(completions.lock().len(), 1);
    assert_eq!(completions.lock()[0].trigger, CompletionTrigger::IdleTimeout);

    let fetched = monitor.get_client(&entity.id).await.unwrap();
    assert_eq!(fetched.metrics.request_count, 1);

    monitor.shutdown().await;
}

#[tokio::test]
async fn concurrent_registrations_via_monitor() {
    let monitor = Arc::new(SessionMonitor::new(quiet_options()));

    let mut handles = Vec::new();
    for i in 0..100 {
        let monitor = Arc::clone(&monitor);
        handles.push(tokio::spawn(async move {
            monitor.register_client(client(&format!("client-{i}"))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(monitor.list_active().await.len(), 100);

    monitor.shutdown().await;
    assert!(monitor.list_active().await.is_empty());
}

#[tokio::test]
async fn shutdown_disconnects_everything() {
    let monitor = SessionMonitor::new(quiet_options());

    let disconnects = Arc::new(parking_lot::Mutex::new(0usize));
    let sink = Arc::clone(&disconnects);
    monitor.bus().subscribe("probe", move |event: &MonitorEvent| {
        if matches!(event, MonitorEvent::ClientDisconnected { .. }) {
            *sink.lock() += 1;
        }
        Ok(())
    });

    for id in ["a", "b", "c"] {
        let entity = monitor.register_client(client(id)).await.unwrap();
        monitor.start_tracking(&entity.id).await.unwrap();
    }

    monitor.shutdown().await;

    assert_eq!(*disconnects.lock(), 3);
    let stats = monitor.get_stats().await;
    assert_eq!(stats.active_clients, 0);
    assert_eq!(stats.tracking_sessions, 0);
    assert_eq!(stats.history_entries, 3);

    // Stopping twice stays a no-op.
    assert!(!monitor.stop_tracking(&ClientId::from("a")).await);
}
