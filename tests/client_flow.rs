//! End-to-end client behavior against a recording transport and a manual clock.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use blackbox::connection::ConnectionState;
use blackbox::router::HandlerError;
use blackbox::telemetry::HistoryField;
use blackbox::{Category, Priority};
use common::{Harness, CONNECT_TIMEOUT_MS, HEARTBEAT_MS};

#[test]
fn test_open_authenticates_then_subscribes() {
    let mut h = Harness::new(Some("pit-wall-key"), &["telemetry", "strategy"]);
    h.connect_and_open();

    assert_eq!(h.sent_types(), vec!["auth", "subscribe"]);
    let sent = h.sent();
    assert_eq!(sent[0]["data"]["token"], "pit-wall-key");
    assert_eq!(sent[1]["data"]["channels"][0], "telemetry");
    assert_eq!(sent[1]["data"]["channels"][1], "strategy");
    assert_eq!(h.client.state(), ConnectionState::Authenticating);

    h.frame(r#"{"type":"auth","timestamp":1,"data":{"success":true}}"#);
    assert_eq!(h.client.state(), ConnectionState::Open);
    assert_eq!(h.last_detail().as_deref(), Some("authenticated"));
}

#[test]
fn test_rejected_credential_fails_until_connect() {
    let mut h = Harness::new(Some("stale"), &[]);
    h.connect_and_open();
    h.frame(r#"{"type":"auth","data":{"success":false,"message":"expired key"}}"#);

    assert_eq!(h.client.state(), ConnectionState::Failed);
    assert!(h.last_detail().unwrap().contains("expired key"));

    h.advance(120_000);
    assert_eq!(h.open_count(), 1);

    h.client.connect();
    assert_eq!(h.client.state(), ConnectionState::Connecting);
    assert_eq!(h.open_count(), 2);
}

#[test]
fn test_telemetry_merges_into_snapshot() {
    let mut h = Harness::new(None, &[]);
    h.connect_and_open();

    h.frame(r#"{"type":"telemetry","timestamp":100,"data":{"speed":201.5,"gear":5}}"#);
    h.frame(r#"{"type":"telemetry_update","timestamp":200,"data":{"rpm":11800}}"#);
    h.frame(r#"{"type":"session","data":{"trackName":"Monza","totalLaps":53}}"#);

    let snapshot = h.client.snapshot();
    assert_eq!(snapshot.speed, 201.5);
    assert_eq!(snapshot.gear, 5);
    assert_eq!(snapshot.rpm, 11800.0);
    assert_eq!(snapshot.track_name, "Monza");
    assert_eq!(snapshot.total_laps, 53);

    let speed = h.client.history(HistoryField::Speed);
    assert_eq!(speed.len(), 2);
    assert_eq!(speed[0].timestamp, 100);
    assert_eq!(speed[1].value, 201.5);
}

#[test]
fn test_malformed_frames_are_dropped_without_side_effects() {
    let mut h = Harness::new(None, &[]);
    h.connect_and_open();
    h.frame(r#"{"type":"telemetry","data":{"speed":150}}"#);
    let changes = h.change_count();

    h.frame("not json");
    h.frame(r#"{"data":{"speed":10}}"#);
    h.frame(r#"{"type":"telemetry","data":{"speed":"fast"}}"#);
    h.frame(r#"{"type":"telemetry","data":[1,2,3]}"#);

    assert_eq!(h.client.state(), ConnectionState::Open);
    assert_eq!(h.change_count(), changes);
    assert_eq!(h.client.snapshot().speed, 150.0);
}

#[test]
fn test_low_fuel_raises_critical_suggestion() {
    let mut h = Harness::new(None, &[]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    h.client.on_suggestions(move |list| {
        sink.borrow_mut().push(list.to_vec());
        Ok(())
    });

    h.connect_and_open();
    h.frame(
        r#"{"type":"telemetry","data":{"fuelLevel":5,"fuelCapacity":100,"fuelUsagePerLap":2.5}}"#,
    );

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    let list = &seen[0];
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].priority, Priority::Critical);
    assert_eq!(list[0].category, Category::Fuel);
    assert_eq!(h.client.suggestions(), *list);
}

#[test]
fn test_unchanged_suggestions_do_not_notify() {
    let mut h = Harness::new(None, &[]);
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    h.client.on_suggestions(move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    h.connect_and_open();
    h.frame(r#"{"type":"telemetry","data":{"engineTemp":115}}"#);
    h.frame(r#"{"type":"telemetry","data":{"speed":180}}"#);
    h.frame(r#"{"type":"telemetry","data":{"engineTemp":90}}"#);

    assert_eq!(calls.get(), 2);
    assert!(h.client.suggestions().is_empty());
}

#[test]
fn test_ping_is_answered_with_one_pong() {
    let mut h = Harness::new(None, &[]);
    let routed = Rc::new(Cell::new(0));
    let counter = routed.clone();
    h.client.on_message("ping", move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    h.connect_and_open();
    let before = h.sent().len();
    h.frame(r#"{"type":"ping","timestamp":424242}"#);

    let sent = h.sent();
    assert_eq!(sent.len(), before + 1);
    assert_eq!(sent[before]["type"], "pong");
    assert_eq!(sent[before]["timestamp"], 424242);
    assert_eq!(routed.get(), 0);
}

#[test]
fn test_failing_handlers_are_isolated() {
    let mut h = Harness::new(None, &[]);
    let lap_calls = Rc::new(Cell::new(0));
    let flag_calls = Rc::new(Cell::new(0));

    h.client.on_message("lap_event", |_| {
        Err(HandlerError::Failed("lap handler broke".to_string()))
    });
    h.client.on_message("lap_event", |_| panic!("lap handler panicked"));
    let counter = lap_calls.clone();
    h.client.on_message("lap_event", move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    let counter = flag_calls.clone();
    h.client.on_message("flag_event", move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    h.connect_and_open();
    h.frame(r#"{"type":"lap_event","data":{"lap":12}}"#);
    h.frame(r#"{"type":"flag_event","data":{"flag":"yellow"}}"#);
    h.frame(r#"{"type":"lap_event","data":{"lap":13}}"#);

    assert_eq!(lap_calls.get(), 2);
    assert_eq!(flag_calls.get(), 1);
    assert_eq!(h.client.state(), ConnectionState::Open);
}

#[test]
fn test_unsubscribed_handler_is_not_called() {
    let mut h = Harness::new(None, &[]);
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let id = h.client.on_message("lap_event", move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });

    h.connect_and_open();
    h.frame(r#"{"type":"lap_event"}"#);
    h.client.off_message("lap_event", id);
    h.frame(r#"{"type":"lap_event"}"#);

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_abnormal_close_reconnects_after_backoff() {
    let mut h = Harness::new(None, &[]);
    h.connect_and_open();
    h.close(1006);

    assert_eq!(h.client.state(), ConnectionState::Reconnecting);
    assert!(h.last_detail().unwrap().contains("1006"));

    h.advance(2_999);
    assert_eq!(h.open_count(), 1);

    h.advance(1);
    assert_eq!(h.client.state(), ConnectionState::Connecting);
    assert_eq!(h.open_count(), 2);

    h.open();
    assert_eq!(h.client.state(), ConnectionState::Open);
    assert_eq!(h.client.connection().attempts(), 0);
}

#[test]
fn test_server_normal_close_goes_idle() {
    let mut h = Harness::new(None, &[]);
    h.connect_and_open();
    h.close(1000);

    assert_eq!(h.client.state(), ConnectionState::Idle);
    assert_eq!(h.last_detail().as_deref(), Some("closed by server"));
    assert_eq!(h.client.next_deadline(), None);
}

#[test]
fn test_gives_up_after_max_attempts() {
    let mut h = Harness::new(None, &[]);
    h.log.borrow_mut().fail_open = true;
    h.client.connect();

    for _ in 0..40 {
        h.advance(30_000);
    }

    assert_eq!(h.client.state(), ConnectionState::Failed);
    assert_eq!(h.open_count(), 11);
    let connecting = h
        .changes
        .borrow()
        .iter()
        .filter(|c| c.state == ConnectionState::Connecting)
        .count();
    assert_eq!(connecting, 11);
    assert_eq!(h.client.next_deadline(), None);
}

#[test]
fn test_backoff_delays_grow_linearly() {
    let mut h = Harness::new(None, &[]);
    h.log.borrow_mut().fail_open = true;
    h.client.connect();

    let start = h.client.now_ms();
    assert_eq!(h.client.next_deadline(), Some(start + 3_000));

    h.advance(3_000);
    assert_eq!(h.open_count(), 2);
    assert_eq!(h.client.next_deadline(), Some(h.client.now_ms() + 6_000));
}

#[test]
fn test_disconnect_is_quiet_from_every_state() {
    let setups: [(&str, fn(&mut Harness)); 5] = [
        ("connecting", |h| h.client.connect()),
        ("open", |h| h.connect_and_open()),
        ("authenticating", |h| h.connect_and_open()),
        ("reconnecting", |h| {
            h.connect_and_open();
            h.close(1006);
        }),
        ("failed", |h| {
            h.log.borrow_mut().fail_open = true;
            h.client.connect();
            for _ in 0..40 {
                h.advance(30_000);
            }
        }),
    ];

    for (name, setup) in setups {
        let credential = (name == "authenticating").then_some("key");
        let mut h = Harness::new(credential, &["telemetry"]);
        setup(&mut h);

        h.client.disconnect();
        assert_eq!(h.client.state(), ConnectionState::Idle, "{name}");
        assert_eq!(h.client.next_deadline(), None, "{name}");

        let changes = h.change_count();
        let sent = h.log.borrow().sent.len();
        let opens = h.open_count();
        for _ in 0..10 {
            h.advance(60_000);
        }

        assert_eq!(h.change_count(), changes, "{name}");
        assert_eq!(h.log.borrow().sent.len(), sent, "{name}");
        assert_eq!(h.open_count(), opens, "{name}");
    }
}

#[test]
fn test_late_events_after_disconnect_are_ignored() {
    let mut h = Harness::new(None, &[]);
    h.client.connect();
    let stale = h.client.connection().generation();
    h.client.disconnect();

    h.client
        .handle_transport_event(blackbox::connection::TransportEvent::opened(stale));
    assert_eq!(h.client.state(), ConnectionState::Idle);
}

#[test]
fn test_unanswered_heartbeat_reconnects() {
    let mut h = Harness::new(None, &[]);
    h.connect_and_open();

    h.advance(HEARTBEAT_MS as i64);
    assert_eq!(h.sent_types().last().map(String::as_str), Some("ping"));
    assert_eq!(h.client.state(), ConnectionState::Open);

    h.advance(HEARTBEAT_MS as i64);
    assert_eq!(h.client.state(), ConnectionState::Reconnecting);
    assert!(h.last_detail().unwrap().contains("heartbeat"));
}

#[test]
fn test_answered_heartbeat_keeps_connection() {
    let mut h = Harness::new(None, &[]);
    h.connect_and_open();

    for _ in 0..5 {
        h.advance(HEARTBEAT_MS as i64);
        h.frame(r#"{"type":"pong"}"#);
    }

    assert_eq!(h.client.state(), ConnectionState::Open);
    let pings = h.sent_types().iter().filter(|t| *t == "ping").count();
    assert_eq!(pings, 5);
}

#[test]
fn test_connect_timeout_schedules_reconnect() {
    let mut h = Harness::new(None, &[]);
    h.client.connect();

    h.advance(CONNECT_TIMEOUT_MS as i64 - 1);
    assert_eq!(h.client.state(), ConnectionState::Connecting);

    h.advance(1);
    assert_eq!(h.client.state(), ConnectionState::Reconnecting);
    assert!(h.last_detail().unwrap().contains("timed out"));
    assert_eq!(h.log.borrow().closes.last(), Some(&1000));
}

#[test]
fn test_subscription_changes_are_announced() {
    let mut h = Harness::new(None, &["telemetry"]);
    h.connect_and_open();

    assert!(h.client.subscribe_channel("timing"));
    assert!(!h.client.subscribe_channel("timing"));
    assert!(h.client.unsubscribe_channel("telemetry"));

    let sent = h.sent();
    let last = sent.last().unwrap();
    assert_eq!(last["type"], "subscribe");
    assert_eq!(last["data"]["channels"].as_array().unwrap().len(), 1);
    assert_eq!(last["data"]["channels"][0], "timing");
    assert_eq!(h.client.channels(), ["timing".to_string()]);
}

#[test]
fn test_requests_need_a_connection() {
    let mut h = Harness::new(None, &[]);
    assert!(h.client.request_status().is_err());

    h.connect_and_open();
    h.client.request_telemetry(&["tires", "fuel"]).unwrap();
    h.client
        .send_voice_command("box box", serde_json::json!({ "confidence": 0.93 }))
        .unwrap();

    let sent = h.sent();
    let n = sent.len();
    assert_eq!(sent[n - 2]["type"], "request_telemetry");
    assert_eq!(sent[n - 2]["data"]["categories"][1], "fuel");
    assert_eq!(sent[n - 1]["type"], "voice_command");
    assert_eq!(sent[n - 1]["data"]["command"], "box box");
}

#[test]
fn test_reconnect_reissues_auth_and_subscription() {
    let mut h = Harness::new(Some("pit-wall-key"), &["telemetry", "timing"]);
    h.connect_and_open();
    h.frame(r#"{"type":"auth","data":{"success":true}}"#);
    h.close(1006);
    assert_eq!(h.client.state(), ConnectionState::Reconnecting);

    // Changes made while down are part of the next announcement
    assert!(h.client.subscribe_channel("strategy"));

    h.advance(3_000);
    assert_eq!(h.client.state(), ConnectionState::Connecting);
    let before = h.sent().len();
    h.open();

    let sent = h.sent();
    let after: Vec<_> = sent[before..].iter().collect();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0]["type"], "auth");
    assert_eq!(after[0]["data"]["token"], "pit-wall-key");
    assert_eq!(after[1]["type"], "subscribe");
    assert_eq!(
        after[1]["data"]["channels"],
        serde_json::json!(["telemetry", "timing", "strategy"])
    );
}

#[test]
fn test_foreign_handler_id_leaves_store_handler_alone() {
    let mut h = Harness::new(None, &[]);
    let lap = h.client.on_message("lap_event", |_| Ok(()));
    h.client.off_message("telemetry", lap);
    h.client.off_message("session", lap);

    h.connect_and_open();
    h.frame(r#"{"type":"telemetry","data":{"speed":201.5}}"#);
    h.frame(r#"{"type":"session","data":{"trackName":"Spa"}}"#);

    let snapshot = h.client.snapshot();
    assert_eq!(snapshot.speed, 201.5);
    assert_eq!(snapshot.track_name, "Spa");
}

#[test]
fn test_stale_handler_id_does_not_remove_replacement() {
    let mut h = Harness::new(None, &[]);
    let old = h.client.on_message("lap_event", |_| Ok(()));
    h.client.off_message("lap_event", old);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    h.client.on_message("lap_event", move |_| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    h.client.off_message("lap_event", old);
    assert!(!h.client.off_status(old));
    assert!(!h.client.off_suggestions(old));

    h.connect_and_open();
    h.frame(r#"{"type":"lap_event"}"#);
    assert_eq!(calls.get(), 1);
    assert!(h.change_count() > 0);
}

#[test]
fn test_unacknowledged_auth_continues_open() {
    let mut h = Harness::new(Some("pit-wall-key"), &[]);
    h.connect_and_open();
    assert_eq!(h.client.state(), ConnectionState::Authenticating);

    h.advance(CONNECT_TIMEOUT_MS as i64);
    assert_eq!(h.client.state(), ConnectionState::Open);
    assert_eq!(h.last_detail().as_deref(), Some("auth not acknowledged"));
    assert_eq!(h.open_count(), 1);
}

#[test]
fn test_status_response_fields_reach_handlers() {
    let mut h = Harness::new(None, &[]);
    let clients = Rc::new(Cell::new(0));
    let sink = clients.clone();
    h.client.on_message("status_response", move |env| {
        if let blackbox::protocol::Message::Other { data, .. } = &env.message {
            sink.set(data["connected_clients"].as_u64().unwrap_or(0));
        }
        Ok(())
    });

    h.connect_and_open();
    h.client.request_status().unwrap();
    h.frame(r#"{"type":"status_response","connected_clients":4}"#);
    assert_eq!(clients.get(), 4);
}
