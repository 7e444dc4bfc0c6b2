//! Unit tests for the event bus
//!
//! Covers ordered fan-out, per-subscriber error isolation, unsubscription,
//! and the stable JSON event schema consumed by notification collaborators.

use chrono::Utc;
use std::sync::Arc;

use taskwatch::{
    ClientId, ClientKind, ClientStatus, CompletionDetails, CompletionEvent, CompletionTrigger,
    EventBus, MonitorEvent,
};

fn connected_event(id: &str) -> MonitorEvent {
    MonitorEvent::ClientConnected {
        client_id: ClientId::from(id),
        name: format!("client {id}"),
        kind: ClientKind::GenericAgent,
        timestamp: Utc::now(),
    }
}

#[test]
fn subscribers_run_in_registration_order() {
    let bus = EventBus::new();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        bus.subscribe(name, move |_event| {
            order.lock().push(name);
            Ok(())
        });
    }

    bus.publish(&connected_event("a"));
    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    assert_eq!(bus.published(), 1);
}

#[test]
fn failing_subscriber_is_isolated() {
    let bus = EventBus::new();
    let delivered = Arc::new(parking_lot::Mutex::new(Vec::new()));

    bus.subscribe("faulty", |_event| -> anyhow::Result<()> {
        anyhow::bail!("subscriber exploded")
    });
    {
        let delivered = Arc::clone(&delivered);
        bus.subscribe("healthy", move |_event| {
            delivered.lock().push(());
            Ok(())
        });
    }

    bus.publish(&connected_event("a"));
    bus.publish(&connected_event("b"));
    assert_eq!(delivered.lock().len(), 2);
}

#[test]
fn panicking_subscriber_is_isolated() {
    let bus = EventBus::new();
    let delivered = Arc::new(parking_lot::Mutex::new(0usize));

    bus.subscribe("panicky", |_event| -> anyhow::Result<()> { panic!("boom") });
    {
        let delivered = Arc::clone(&delivered);
        bus.subscribe("healthy", move |_event| {
            *delivered.lock() += 1;
            Ok(())
        });
    }

    bus.publish(&connected_event("a"));
    assert_eq!(*delivered.lock(), 1);
}

#[test]
fn unsubscribed_callbacks_stop_receiving() {
    let bus = EventBus::new();
    let delivered = Arc::new(parking_lot::Mutex::new(0usize));

    let token = {
        let delivered = Arc::clone(&delivered);
        bus.subscribe("transient", move |_event| {
            *delivered.lock() += 1;
            Ok(())
        })
    };

    bus.publish(&connected_event("a"));
    assert!(bus.unsubscribe(token));
    assert!(!bus.unsubscribe(token));
    bus.publish(&connected_event("b"));

    assert_eq!(*delivered.lock(), 1);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn lifecycle_event_schema_is_stable() {
    let event = MonitorEvent::ClientStatusChanged {
        client_id: ClientId::from("agent-1"),
        from: ClientStatus::Connected,
        to: ClientStatus::Running,
        timestamp: Utc::now(),
    };

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "client_status_changed");
    assert_eq!(json["client_id"], "agent-1");
    assert_eq!(json["from"], "connected");
    assert_eq!(json["to"], "running");
    assert!(json["timestamp"].is_string());
}

#[test]
fn completion_event_schema_is_stable() {
    let event = MonitorEvent::TaskCompleted(CompletionEvent {
        client_id: ClientId::from("agent-1"),
        trigger: CompletionTrigger::FileAnalysis,
        details: CompletionDetails::FileMatch {
            file: "/work/build.log".into(),
            matched_keywords: vec!["done".to_string(), "success".to_string()],
        },
        timestamp: Utc::now(),
    });

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task_completed");
    assert_eq!(json["client_id"], "agent-1");
    assert_eq!(json["trigger"], "file_analysis");
    assert_eq!(json["details"]["file"], "/work/build.log");
    assert_eq!(json["details"]["matched_keywords"][0], "done");

    // Round-trips through the wire format.
    let decoded: MonitorEvent = serde_json::from_value(json).unwrap();
    assert_eq!(decoded.client_id(), &ClientId::from("agent-1"));
}
