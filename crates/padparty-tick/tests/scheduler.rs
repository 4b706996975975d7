//! Integration tests for the fixed-timestep tick scheduler.
//!
//! Time-dependent tests run with `start_paused = true` so Tokio's clock
//! auto-advances and `sleep_until` resolves deterministically.

use std::time::Duration;

use padparty_tick::{TickConfig, TickScheduler};

fn config_20hz() -> TickConfig {
    TickConfig {
        tick_rate_hz: 20,
        initial_jitter_us: 0,
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_event_driven() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 0);
    assert_eq!(cfg.tick_duration(), None);
}

#[test]
fn test_with_rate_sets_duration() {
    let cfg = TickConfig::with_rate(20);
    assert_eq!(cfg.tick_duration(), Some(Duration::from_millis(50)));
}

#[test]
fn test_validated_clamps_excessive_rate() {
    let cfg = TickConfig::with_rate(10_000).validated();
    assert_eq!(cfg.tick_rate_hz, TickConfig::MAX_TICK_RATE_HZ);
}

// =========================================================================
// Scheduler
// =========================================================================

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::new(config_20hz());
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.tick_rate_hz(), 20);
    assert!(!s.is_event_driven());
    assert!(!s.is_paused());
}

#[test]
fn test_event_driven_scheduler_reports_mode() {
    let s = TickScheduler::with_rate(0);
    assert!(s.is_event_driven());
    assert_eq!(s.tick_duration(), None);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_fire_with_fixed_dt() {
    let mut s = TickScheduler::new(config_20hz());

    for expected in 1..=5u64 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.dt, Duration::from_millis(50));
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_event_driven_wait_pends_forever() {
    let mut s = TickScheduler::with_rate(0);

    let result = tokio::time::timeout(
        Duration::from_secs(3600),
        s.wait_for_tick(),
    )
    .await;
    assert!(result.is_err(), "event-driven tick must never fire");
}

#[tokio::test(start_paused = true)]
async fn test_paused_scheduler_does_not_tick() {
    let mut s = TickScheduler::new(config_20hz());
    s.pause();
    assert!(s.is_paused());

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        s.wait_for_tick(),
    )
    .await;
    assert!(result.is_err(), "paused scheduler must not fire");
}

#[tokio::test(start_paused = true)]
async fn test_resume_restarts_ticking_without_burst() {
    let mut s = TickScheduler::new(config_20hz());
    s.wait_for_tick().await;

    s.pause();
    // A long pause must not produce catch-up ticks on resume.
    tokio::time::sleep(Duration::from_secs(10)).await;
    s.resume();

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 2, "no ticks accumulate while paused");
    assert!(!info.overrun);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_are_idempotent() {
    let mut s = TickScheduler::new(config_20hz());
    s.pause();
    s.pause();
    assert!(s.is_paused());
    s.resume();
    s.resume();
    assert!(!s.is_paused());

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
}

#[tokio::test(start_paused = true)]
async fn test_overrun_skips_ahead() {
    let mut s = TickScheduler::new(config_20hz());
    s.wait_for_tick().await;

    // Simulate a stalled engine: sleep through several tick deadlines
    // before asking for the next tick.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert!(info.ticks_skipped > 0);

    // After skipping, the cadence recovers: the following tick is on time.
    let info = s.wait_for_tick().await;
    assert!(!info.overrun);
}
