//! Edge case and boundary condition tests for the cover controller

use std::time::Duration;

use rs_shutters::estimator::{clamp_position, interpolate};
use rs_shutters::hal::{MockInvoker, MockPublisher};
use rs_shutters::{
    parse_stop_sequence, spawn_cover, CoverCommand, CoverConfig, CoverController, CoverHandle,
    SensorEvent,
};
use tokio::time::{sleep, Instant};

const UP: &str = "binary_sensor.up";
const DOWN: &str = "binary_sensor.down";

fn config() -> CoverConfig {
    CoverConfig::new("switch.up", "switch.down").with_initial_position(0.0)
}

fn spawn(config: CoverConfig, invoker: MockInvoker) -> CoverHandle {
    let controller = CoverController::new(config, invoker, MockPublisher::new()).unwrap();
    spawn_cover(controller).0
}

// ============================================================================
// Boundary Value Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn position_above_range_is_clamped() {
    let cover = spawn(config(), MockInvoker::new());
    cover.set_position(250.0).await.unwrap();
    assert_eq!(cover.state().await.unwrap().target_position, Some(100));
}

#[tokio::test(start_paused = true)]
async fn position_below_range_at_zero_is_a_stop() {
    let invoker = MockInvoker::new();
    let cover = spawn(config(), invoker.clone());
    cover.set_position(-20.0).await.unwrap();

    assert!(!cover.state().await.unwrap().is_closing);
    assert_eq!(invoker.call_ids(), ["switch.turn_off"]);
}

#[tokio::test(start_paused = true)]
async fn nan_position_counts_as_zero() {
    let cover = spawn(config().with_initial_position(60.0), MockInvoker::new());
    cover.set_position(f64::NAN).await.unwrap();
    assert_eq!(cover.state().await.unwrap().target_position, Some(0));
}

#[tokio::test(start_paused = true)]
async fn fractional_target_rounds() {
    let cover = spawn(config(), MockInvoker::new());
    cover.set_position(49.6).await.unwrap();
    assert_eq!(cover.state().await.unwrap().target_position, Some(50));
}

#[test]
fn interpolation_never_overshoots() {
    let start = Instant::now();
    let duration = Duration::from_secs(7);
    let mut last = 90.0;
    for tenth in 0..=100 {
        let now = start + Duration::from_millis(tenth * 100);
        let p = interpolate(90.0, 10.0, start, duration, now);
        assert!((10.0..=90.0).contains(&p));
        assert!(p <= last);
        last = p;
    }
    assert_eq!(last, 10.0);
}

#[test]
fn clamp_position_edges() {
    assert_eq!(clamp_position(f64::INFINITY), 100);
    assert_eq!(clamp_position(f64::NEG_INFINITY), 0);
    assert_eq!(clamp_position(99.5), 100);
    assert_eq!(clamp_position(0.49), 0);
}

// ============================================================================
// Stop Sequence Text
// ============================================================================

#[test]
fn blank_and_non_list_texts_are_empty() {
    for text in ["", "   \n\t", "action: switch.turn_off", "42", "[unclosed"] {
        assert!(parse_stop_sequence(text).is_empty(), "text {text:?}");
    }
}

#[test]
fn malformed_step_is_skipped_in_order() {
    let steps = parse_stop_sequence(
        r#"
- action: switch.turn_on
  entity_id: switch.a
- action: no_namespace
- service: light.turn_off
- action: script.finish
  delay: "1.5"
"#,
    );
    let ids: Vec<String> = steps
        .iter()
        .map(|s| format!("{}.{}", s.namespace, s.action))
        .collect();
    assert_eq!(ids, ["switch.turn_on", "light.turn_off", "script.finish"]);
    assert_eq!(steps[2].delay, Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn malformed_sequence_falls_back_at_stop() {
    let invoker = MockInvoker::new();
    let cover = spawn(
        config().with_stop_sequence("- action: [not, a, string]"),
        invoker.clone(),
    );
    cover.open().await.unwrap();
    cover.stop().await.unwrap();
    assert_eq!(invoker.call_ids(), ["switch.turn_on", "switch.turn_off"]);
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn command_during_stop_sequence_waits_for_it() {
    let invoker = MockInvoker::new();
    let cover = spawn(
        config().with_stop_sequence("- action: script.brake\n  delay: 2\n- action: script.release"),
        invoker.clone(),
    );
    cover.open().await.unwrap();
    sleep(Duration::from_secs(4)).await;

    let stopper = cover.clone();
    let stop = tokio::spawn(async move { stopper.stop().await });
    tokio::task::yield_now().await;
    cover.close().await.unwrap();
    stop.await.unwrap().unwrap();

    assert_eq!(
        invoker.call_ids(),
        ["switch.turn_on", "script.brake", "script.release", "switch.turn_on"]
    );
    let state = cover.state().await.unwrap();
    assert!(state.is_closing);
}

#[tokio::test(start_paused = true)]
async fn repeated_stops_are_harmless() {
    let invoker = MockInvoker::new();
    let cover = spawn(config().with_initial_position(45.0), invoker.clone());
    for _ in 0..3 {
        cover.command(CoverCommand::Stop).await.unwrap();
    }
    assert_eq!(invoker.calls().len(), 3);
    assert_eq!(cover.state().await.unwrap().position, 45);
}

// ============================================================================
// Sensor Edge Cases
// ============================================================================

#[tokio::test(start_paused = true)]
async fn both_sensors_active_prefers_latest_movement() {
    let cover = spawn(
        config().with_initial_position(50.0).with_sensors(Some(UP), Some(DOWN)),
        MockInvoker::new(),
    );
    cover.sensor_event(SensorEvent::on(UP)).await.unwrap();
    cover.sensor_event(SensorEvent::on(DOWN)).await.unwrap();
    let state = cover.state().await.unwrap();
    assert!(state.is_closing && !state.is_opening);

    // one sensor going quiet does not stop tracking
    cover.sensor_event(SensorEvent::off(DOWN)).await.unwrap();
    assert!(cover.state().await.unwrap().movement.is_some());

    cover.sensor_event(SensorEvent::off(UP)).await.unwrap();
    assert!(cover.state().await.unwrap().movement.is_none());
}

#[tokio::test(start_paused = true)]
async fn non_on_states_are_inactive() {
    let cover = spawn(config().with_sensors(Some(UP), None), MockInvoker::new());
    for state in ["unavailable", "unknown", "ON ", "true"] {
        cover
            .sensor_event(SensorEvent::new(UP, Some(state)))
            .await
            .unwrap();
        assert!(!cover.state().await.unwrap().is_opening, "state {state:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn sensor_reaching_endpoint_keeps_reporting_motion() {
    let cover = spawn(
        config().with_open_time(2.0).with_sensors(Some(UP), None),
        MockInvoker::new(),
    );
    cover.sensor_event(SensorEvent::on(UP)).await.unwrap();
    sleep(Duration::from_secs(3)).await;

    let state = cover.state().await.unwrap();
    assert_eq!(state.position, 100);
    assert!(state.is_opening);
    assert!(state.movement.is_none());

    cover.sensor_event(SensorEvent::off(UP)).await.unwrap();
    let state = cover.state().await.unwrap();
    assert_eq!(state.position, 100);
    assert!(!state.is_opening);
}

#[tokio::test(start_paused = true)]
async fn zero_length_options_update_is_rejected() {
    let cover = spawn(config(), MockInvoker::new());
    assert!(cover
        .update_options(config().with_open_time(0.0))
        .await
        .is_err());
    cover.open().await.unwrap();
    sleep(Duration::from_secs(10)).await;
    assert_eq!(cover.state().await.unwrap().position, 50);
}
