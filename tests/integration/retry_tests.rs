//! Failed-read handling: grace period, release and recovery.

use crate::mock_bus::{Harness, id};
use temprelay::app::events::AppEvent;
use temprelay::config::SettingChange;
use temprelay::control::retry::Freshness;

const ADC: &str = "adc_builtin0_6";

fn running() -> Harness {
    let mut h = Harness::new();
    h.take_both_relays();
    h.set_temperature(ADC, Some(32.0));
    h.set_setting(ADC, SettingChange::Enabled(true));
    h.configure_conditions(ADC, 0, 1);
    h.tick();
    assert_eq!(h.states(ADC), [Some(true), Some(false)]);
    h
}

#[test]
fn grace_period_then_release_then_recovery() {
    let mut h = running();

    h.set_temperature(ADC, None);
    for n in 1..=299 {
        let summary = h.tick();
        assert_eq!(summary.released, 0);
        assert_eq!(h.states(ADC), [Some(true), Some(false)], "failed read #{n}");
        assert_eq!(h.relays(), [true, false]);
    }

    let summary = h.tick();
    assert_eq!(summary.released, 1);
    assert_eq!(h.states(ADC), [Some(false), Some(false)]);
    assert_eq!(h.relays(), [false, false]);
    assert!(
        h.sink
            .events
            .iter()
            .any(|e| matches!(e, AppEvent::SensorExhausted(s) if *s == id(ADC)))
    );

    // Stays released, and the release is not repeated.
    for _ in 0..50 {
        assert_eq!(h.tick().released, 0);
    }
    let sensor = h.app.sensor(&id(ADC)).unwrap();
    assert_eq!(sensor.freshness(), Freshness::Exhausted);
    assert_eq!(sensor.failed_reads(), 300);

    h.set_temperature(ADC, Some(32.0));
    h.tick();
    assert_eq!(h.states(ADC), [Some(true), Some(false)]);
    assert_eq!(h.relays(), [true, false]);
    assert_eq!(h.app.sensor(&id(ADC)).unwrap().failed_reads(), 0);
}

#[test]
fn intermittent_failures_never_accumulate() {
    let mut h = running();

    for _ in 0..3 {
        h.set_temperature(ADC, None);
        for _ in 0..200 {
            h.tick();
            assert_eq!(h.states(ADC), [Some(true), Some(false)]);
        }
        h.set_temperature(ADC, Some(32.0));
        h.tick();
        assert_eq!(h.states(ADC), [Some(true), Some(false)]);
    }
    assert_eq!(h.app.metrics().sensor_releases, 0);
}

#[test]
fn recovery_uses_the_fresh_reading_immediately() {
    let mut h = running();

    h.set_temperature(ADC, None);
    h.ticks(149);

    // Frozen at active; the first valid reading is cold.
    h.set_temperature(ADC, Some(21.0));
    let summary = h.tick();
    assert_eq!(summary.evaluated, 1);
    assert_eq!(h.states(ADC), [Some(false), Some(false)]);
    assert_eq!(h.relays(), [false, false]);
}

#[test]
fn non_finite_reading_counts_as_failed() {
    let mut h = running();
    h.set_temperature(ADC, Some(f32::NAN));
    let summary = h.tick();
    assert_eq!(summary.evaluated, 0);
    assert_eq!(h.states(ADC), [Some(true), Some(false)]);
    assert_eq!(h.app.sensor(&id(ADC)).unwrap().failed_reads(), 1);
}
