use super::*;
use crate::error::ErrorCode;
use crate::fake_dom::{CLIENT_EPOCH_MS, FakeDom, FakeQr, Rig};
use crate::scheduler::ManualScheduler;
use crate::surface::Viewport;

fn host_for(scheduler: &ManualScheduler, dom: &FakeDom) -> Host {
    Host {
        scheduler: Rc::new(scheduler.clone()),
        clock: Rc::new(scheduler.clone()),
        surface: Rc::new(dom.clone()),
        qr: Rc::new(FakeQr::new(dom.clone(), true)),
    }
}

fn construction_error(server_time: &str) -> EngineError {
    let scheduler = ManualScheduler::new(CLIENT_EPOCH_MS);
    let dom = FakeDom::new(Viewport::new(1280, 900));
    match CountdownEngine::new(server_time, EngineConfig::default(), host_for(&scheduler, &dom)) {
        Ok(_) => panic!("{server_time:?} should be rejected"),
        Err(err) => err,
    }
}

#[test]
fn server_now_matches_supplied_server_time() {
    let rig = Rig::new(EngineConfig::default());
    assert_eq!(rig.engine.offset_ms(), 0);
    assert_eq!(rig.engine.server_now_ms(), CLIENT_EPOCH_MS);
}

#[test]
fn skewed_client_clock_is_projected_onto_server_time() {
    let rig = Rig::build(
        "2024-05-01T12:35:06.250Z",
        EngineConfig::default(),
        FakeDom::kiosk_page(Viewport::new(1280, 900)),
        true,
    );
    assert_eq!(rig.engine.offset_ms(), 10_250);
    assert_eq!(rig.engine.server_now_ms(), CLIENT_EPOCH_MS + 10_250);

    rig.scheduler.advance(1_500);
    assert_eq!(rig.engine.server_now_ms(), CLIENT_EPOCH_MS + 11_750);
    let now = rig.engine.server_now().expect("in range");
    assert_eq!((now.hour(), now.minute(), now.second()), (12, 35, 7));
}

#[test]
fn malformed_server_time_fails_construction() {
    let err = construction_error("yesterday-ish");
    assert!(matches!(err, EngineError::InvalidTimestamp { .. }));
    assert_eq!(err.error_code(), "E_INVALID_TIMESTAMP");
}

#[test]
fn naive_server_time_is_rejected() {
    let err = construction_error("2024-05-01T12:34:56");
    assert!(matches!(err, EngineError::InvalidTimestamp { ref input, .. } if input == "2024-05-01T12:34:56"));
}

#[test]
fn fresh_engine_schedules_nothing() {
    let rig = Rig::new(EngineConfig::default());
    assert!(rig.engine.live_tickers().is_empty());
    assert_eq!(rig.scheduler.pending(), 0);
    assert_eq!(rig.engine.qr_state().status, crate::qr::QrStatus::Idle);
}

#[test]
fn live_tickers_lists_each_running_kind() {
    let rig = Rig::new(EngineConfig::default());
    rig.engine.start_qr_countdown(30).expect("target present");
    rig.engine.start_wall_clock().expect("target present");
    rig.engine.start_activity_countdown(120).expect("target present");

    assert_eq!(
        rig.engine.live_tickers(),
        vec![TickerKind::WallClock, TickerKind::StartCountdown, TickerKind::QrCountdown]
    );
    assert_eq!(rig.scheduler.pending(), 3);
}

#[test]
fn reactivating_a_kind_leaves_one_task() {
    let rig = Rig::new(EngineConfig::default());
    rig.engine.start_activity_countdown(500).expect("target present");
    rig.engine.start_activity_countdown(10).expect("target present");
    assert_eq!(rig.scheduler.pending(), 1);
    assert_eq!(rig.dom.watcher_count(), 1);

    rig.tick(1);
    assert_eq!(rig.text("start-countdown"), "9s");
}

#[test]
fn teardown_cancels_every_task_and_subscription() {
    let rig = Rig::new(EngineConfig::default());
    rig.engine.start_wall_clock().expect("target present");
    rig.engine.start_activity_countdown(60).expect("target present");
    rig.engine.render_qr("https://example.test/checkin/abc").expect("container present");
    assert_eq!(rig.dom.resize_listener_count(), 1);

    rig.engine.teardown();
    assert!(rig.engine.live_tickers().is_empty());
    assert_eq!(rig.scheduler.pending(), 0);
    assert_eq!(rig.dom.watcher_count(), 0);
    assert_eq!(rig.dom.resize_listener_count(), 0);

    let clock_writes = rig.dom.get("current-time").writes();
    rig.tick(5);
    assert_eq!(rig.dom.get("current-time").writes(), clock_writes);
}

#[test]
fn engine_is_reusable_after_teardown() {
    let rig = Rig::new(EngineConfig::default());
    rig.engine.start_activity_countdown(60).expect("target present");
    rig.engine.teardown();

    rig.engine.start_activity_countdown(5).expect("target present");
    rig.tick(1);
    assert_eq!(rig.text("start-countdown"), "4s");
}

#[test]
fn dropping_the_engine_cancels_outstanding_tasks() {
    let Rig { engine, scheduler, dom, .. } = Rig::new(EngineConfig::default());
    engine.start_wall_clock().expect("target present");
    engine.start_qr_countdown(30).expect("target present");
    engine.render_qr("https://example.test/checkin/abc").expect("container present");
    assert_eq!(scheduler.pending(), 2);

    drop(engine);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(dom.watcher_count(), 0);
    assert_eq!(dom.resize_listener_count(), 0);
}

#[test]
fn missing_target_is_reported_and_schedules_nothing() {
    let dom = FakeDom::new(Viewport::new(1280, 900));
    dom.add("current-time");
    let rig = Rig::build(crate::fake_dom::SERVER_TIME, EngineConfig::default(), dom, true);

    let err = rig.engine.start_activity_countdown(60).err().expect("no countdown target");
    assert!(matches!(err, EngineError::TargetMissing(ref id) if id == "start-countdown"));
    assert_eq!(err.error_code(), "E_TARGET_MISSING");
    assert_eq!(rig.scheduler.pending(), 0);
}

#[test]
fn log_tick_keeps_schedule_alive_after_failure() {
    assert_eq!(log_tick(TickerKind::WallClock, Err(RenderError::new("boom"))), Flow::Continue);
    assert_eq!(log_tick(TickerKind::QrCountdown, Ok(Flow::Stop)), Flow::Stop);
}

#[test]
fn custom_element_ids_are_honoured() {
    let mut config = EngineConfig::default();
    config.elements.start_countdown = "inicio".to_owned();
    let dom = FakeDom::new(Viewport::new(1280, 900));
    dom.add("inicio");
    let rig = Rig::build(crate::fake_dom::SERVER_TIME, config, dom, true);

    rig.engine.start_activity_countdown(65).expect("custom target present");
    assert_eq!(rig.text("inicio"), "1m 5s");
}
