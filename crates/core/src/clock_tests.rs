// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

use super::*;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 > t1);
}

#[test]
fn system_clock_now_utc_is_recent() {
    let clock = SystemClock;
    let now = clock.now_utc();
    assert!((Utc::now() - now).num_seconds().abs() < 5);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    clock.advance(Duration::from_secs(60));
    let t2 = clock.now();
    assert!(t2.duration_since(t1) >= Duration::from_secs(60));
}

#[test]
fn fake_clock_advances_wall_clock_too() {
    let clock = FakeClock::new();
    let t1 = clock.now_utc();
    clock.advance(Duration::from_secs(60));
    let t2 = clock.now_utc();
    assert_eq!((t2 - t1).num_seconds(), 60);
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let t1 = clock1.now();
    clock2.advance(Duration::from_secs(30));
    let t2 = clock1.now();
    assert!(t2.duration_since(t1) >= Duration::from_secs(30));
}

#[test]
fn fake_clock_default() {
    let clock = FakeClock::default();
    let _ = clock.now();
}

#[test]
fn fake_clock_at_sets_initial_utc() {
    let when = Utc::now();
    let clock = FakeClock::at(when);
    assert_eq!(clock.now_utc(), when);
}

#[test]
fn fake_clock_set_utc() {
    let clock = FakeClock::new();
    let future = Utc::now() + chrono::Duration::hours(1);
    clock.set_utc(future);
    assert_eq!(clock.now_utc(), future);
}
